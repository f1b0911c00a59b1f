//! Catalog session.
//!
//! A [`Session`] owns everything that lives for as long as the tool is
//! connected to one catalog server:
//!
//! - the catalog client, created by a factory on first use and reused after
//! - the [`TemplateCache`] filled by [`Session::initialise`]
//! - the [`ReferenceCache`] for configured category/template lookups
//! - the [`ErrorSink`] that remote failures are reported to
//!
//! Nothing here is global; two sessions never share caches. A session is
//! single-threaded and every call blocks until the catalog answers.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::bom::BomEntry;
use crate::catalog::references::{self, ReferenceKind, ReferenceNames};
use crate::catalog::templates::{self, FieldTemplate, MetadataTemplate, TemplateCache};
use crate::catalog::{
    resolver, Catalog, CatalogResult, InMemoryCatalog, Parameter, PartLookup, Pk, Reference,
    ReferenceCache,
};
use crate::config::ServerProfile;
use crate::report::{self, ErrorSink, TracingSink};

/// Creates a catalog client for a server profile.
pub type ClientFactory = Box<dyn Fn(&ServerProfile) -> CatalogResult<Box<dyn Catalog>>>;

/// Returns a factory for offline catalogs.
///
/// Each client is seeded from the JSON snapshot at `snapshot`, or starts
/// empty when no snapshot is configured.
#[must_use]
pub fn snapshot_factory(snapshot: Option<PathBuf>) -> ClientFactory {
    Box::new(move |profile: &ServerProfile| -> CatalogResult<Box<dyn Catalog>> {
        let catalog = match &snapshot {
            Some(path) => InMemoryCatalog::open(path)?,
            None => InMemoryCatalog::new(),
        };
        tracing::debug!(
            address = %profile.address,
            snapshot = ?snapshot,
            "Opened offline catalog"
        );
        Ok(Box::new(catalog))
    })
}

/// A BOM entry together with its catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomStatus {
    /// The BOM entry.
    #[serde(flatten)]
    pub entry: BomEntry,
    /// Lookup of the part referencing the entry's component id.
    pub catalog: PartLookup,
}

/// State shared by all catalog operations of one connection.
pub struct Session {
    profile: ServerProfile,
    factory: ClientFactory,
    client: Option<Box<dyn Catalog>>,
    templates: TemplateCache,
    references: ReferenceCache,
    sink: Box<dyn ErrorSink>,
}

impl Session {
    /// Creates a session. No connection is made until the first catalog call.
    #[must_use]
    pub fn new(profile: ServerProfile, factory: ClientFactory) -> Self {
        Self {
            profile,
            factory,
            client: None,
            templates: TemplateCache::new(),
            references: ReferenceCache::new(),
            sink: Box::new(TracingSink),
        }
    }

    /// Replaces the error sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns true once the catalog client has been created.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The error sink.
    #[must_use]
    pub fn sink(&self) -> &dyn ErrorSink {
        self.sink.as_ref()
    }

    /// The template cache.
    #[must_use]
    pub const fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    /// The reference cache.
    #[must_use]
    pub const fn references(&self) -> &ReferenceCache {
        &self.references
    }

    /// Reference names from the active profile.
    #[must_use]
    pub fn reference_names(&self) -> ReferenceNames {
        self.profile.reference_names()
    }

    fn client<'a>(
        slot: &'a mut Option<Box<dyn Catalog>>,
        factory: &ClientFactory,
        profile: &ServerProfile,
    ) -> CatalogResult<&'a dyn Catalog> {
        let client = match slot.take() {
            Some(client) => client,
            None => {
                let client = factory(profile)?;
                tracing::info!(address = %profile.address, "Catalog client created");
                client
            }
        };
        Ok(&**slot.insert(client))
    }

    /// Ensures the full template set exists and fills the template cache.
    ///
    /// Returns the number of templates created.
    ///
    /// # Errors
    ///
    /// Returns the first remote failure.
    pub fn initialise(&mut self) -> CatalogResult<usize> {
        self.ensure_templates(&FieldTemplate::ALL)
    }

    /// Ensures the given templates exist and refreshes the template cache.
    ///
    /// # Errors
    ///
    /// Returns the first remote failure.
    pub fn ensure_templates(&mut self, expected: &[FieldTemplate]) -> CatalogResult<usize> {
        let catalog = Self::client(&mut self.client, &self.factory, &self.profile)?;
        templates::ensure_templates(catalog, expected, &mut self.templates)
    }

    /// Describes every template of the fixed set with its cached identifier.
    #[must_use]
    pub fn describe_templates(&self) -> Vec<MetadataTemplate> {
        FieldTemplate::ALL
            .iter()
            .map(|field| self.templates.describe(*field))
            .collect()
    }

    /// Resolves a configured reference, using the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote list call fails.
    pub fn resolve_reference(&mut self, kind: ReferenceKind) -> CatalogResult<Option<Reference>> {
        let names = self.profile.reference_names();
        let catalog = Self::client(&mut self.client, &self.factory, &self.profile)?;
        references::resolve_reference(catalog, &names, &mut self.references, kind)
    }

    /// Resolves a reference given its logical name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::catalog::CatalogError::UnknownReference`] for names
    /// without a resolution rule, or an error if the remote call fails.
    pub fn resolve_reference_named(&mut self, name: &str) -> CatalogResult<Option<Reference>> {
        let kind: ReferenceKind = name.parse()?;
        self.resolve_reference(kind)
    }

    /// Looks up the part referencing `id`.
    ///
    /// # Errors
    ///
    /// Returns the remote failure after reporting it to the sink.
    pub fn find_part(&mut self, id: &str) -> CatalogResult<PartLookup> {
        let catalog = Self::client(&mut self.client, &self.factory, &self.profile)
            .map_err(|e| report::capture(self.sink.as_ref(), e))?;
        resolver::find_part(catalog, id, self.sink.as_ref())
    }

    /// Looks up several identifiers with one parameter listing.
    ///
    /// # Errors
    ///
    /// Returns the remote failure after reporting it to the sink.
    pub fn find_parts<S: AsRef<str>>(
        &mut self,
        ids: &[S],
    ) -> CatalogResult<IndexMap<String, PartLookup>> {
        let catalog = Self::client(&mut self.client, &self.factory, &self.profile)
            .map_err(|e| report::capture(self.sink.as_ref(), e))?;
        resolver::find_parts(catalog, ids, self.sink.as_ref())
    }

    /// Looks up the catalog part of every BOM entry by its component id.
    ///
    /// # Errors
    ///
    /// Returns the remote failure after reporting it to the sink.
    pub fn catalog_status(&mut self, bom: &[BomEntry]) -> CatalogResult<Vec<BomStatus>> {
        let ids: Vec<&str> = bom.iter().map(|entry| entry.node.local_id.as_str()).collect();
        let mut lookups = self.find_parts(&ids)?;

        Ok(bom
            .iter()
            .map(|entry| BomStatus {
                entry: entry.clone(),
                catalog: lookups
                    .swap_remove(entry.node.local_id.as_str())
                    .unwrap_or(PartLookup::Missing),
            })
            .collect())
    }

    /// Writes a component's identifier and volume onto a catalog part.
    ///
    /// Existing values are updated in place; nothing is duplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if the templates are not cached yet or a remote call fails.
    pub fn link_component(&mut self, part: Pk, entry: &BomEntry) -> CatalogResult<Vec<Parameter>> {
        let catalog = Self::client(&mut self.client, &self.factory, &self.profile)?;

        let id = templates::upsert_parameter(
            catalog,
            &self.templates,
            part,
            FieldTemplate::Id,
            &entry.node.local_id,
        )?;
        let volume = templates::upsert_parameter(
            catalog,
            &self.templates,
            part,
            FieldTemplate::Volume,
            &entry.volume.to_string(),
        )?;

        tracing::info!(part, component = %entry.node.local_id, "Linked component to part");
        Ok(vec![id, volume])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;

    fn profile() -> ServerProfile {
        serde_json::from_str(
            r#"{
                "address": "https://parts.example.com",
                "part_category": "Mechanical",
                "template_parameter": "Fusion360:Id"
            }"#,
        )
        .unwrap()
    }

    fn in_memory() -> ClientFactory {
        Box::new(|_: &ServerProfile| -> CatalogResult<Box<dyn Catalog>> {
            Ok(Box::new(InMemoryCatalog::new()))
        })
    }

    #[test]
    fn client_created_lazily_once() {
        use std::cell::Cell;
        use std::rc::Rc;

        let created = Rc::new(Cell::new(0));
        let counter = Rc::clone(&created);
        let factory: ClientFactory =
            Box::new(move |_: &ServerProfile| -> CatalogResult<Box<dyn Catalog>> {
                counter.set(counter.get() + 1);
                Ok(Box::new(InMemoryCatalog::new()))
            });

        let mut session = Session::new(profile(), factory);
        assert!(!session.is_connected());
        assert_eq!(created.get(), 0);

        session.find_part("x").unwrap();
        session.find_part("y").unwrap();
        assert!(session.is_connected());
        assert_eq!(created.get(), 1);
    }

    #[test]
    fn factory_failure_leaves_session_disconnected() {
        let factory: ClientFactory =
            Box::new(|profile: &ServerProfile| -> CatalogResult<Box<dyn Catalog>> {
                Err(CatalogError::connect(profile.address.clone(), "refused"))
            });
        let mut session = Session::new(profile(), factory);

        assert!(matches!(
            session.initialise(),
            Err(CatalogError::Connect { .. })
        ));
        assert!(!session.is_connected());
    }

    #[test]
    fn snapshot_factory_seeds_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"parameters": [{"pk": 1, "part": 42, "template": 1, "data": "comp-1"}]}"#,
        )
        .unwrap();

        let mut session = Session::new(profile(), snapshot_factory(Some(path)));
        assert_eq!(
            session.find_part("comp-1").unwrap().part(),
            Some(crate::catalog::Part { pk: 42 })
        );
    }

    #[test]
    fn snapshot_factory_missing_file() {
        let mut session = Session::new(
            profile(),
            snapshot_factory(Some(PathBuf::from("/nonexistent/catalog.json"))),
        );
        assert!(matches!(
            session.find_part("comp-1"),
            Err(CatalogError::SnapshotRead { .. })
        ));
    }

    #[test]
    fn unknown_reference_name() {
        let mut session = Session::new(profile(), in_memory());
        assert!(matches!(
            session.resolve_reference_named("supplier"),
            Err(CatalogError::UnknownReference { .. })
        ));
    }

    #[test]
    fn describe_before_initialise() {
        let mut session = Session::new(profile(), in_memory());
        assert!(session.describe_templates().iter().all(|t| t.remote_id.is_none()));

        session.initialise().unwrap();
        assert!(session.describe_templates().iter().all(|t| t.remote_id.is_some()));
    }
}
