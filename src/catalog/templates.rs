//! Metadata template registry.
//!
//! The link relies on a fixed set of parameter templates in the catalog. Their
//! names are namespaced so they never collide with user-defined templates:
//!
//! ```text
//! Fusion360:Id
//! Fusion360:Volume
//! Fusion360:BoundingBox:Width
//! ```
//!
//! [`ensure_templates`] creates whichever are missing and then fills a
//! [`TemplateCache`] mapping template names to catalog records, which the
//! parameter helpers use to find primary keys.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::{
    Catalog, CatalogError, CatalogResult, NewParameter, NewTemplate, Parameter, ParameterTemplate,
    Pk,
};

/// Namespace prefix of every template name.
pub const NAMESPACE: &str = "Fusion360";

/// Separator between name segments.
pub const SEPARATOR: char = ':';

/// Sub-namespace of the bounding box fields.
const BOUNDING_BOX: &str = "BoundingBox";

/// The metadata fields this tool maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTemplate {
    /// Host component identifier.
    Id,
    /// Surface area.
    Area,
    /// Solid volume.
    Volume,
    /// Mass.
    Mass,
    /// Density.
    Density,
    /// Material name.
    Material,
    /// Bounding box width.
    BoundingBoxWidth,
    /// Bounding box height.
    BoundingBoxHeight,
    /// Bounding box depth.
    BoundingBoxDepth,
}

impl FieldTemplate {
    /// Every field, in registration order.
    pub const ALL: [Self; 9] = [
        Self::Id,
        Self::Area,
        Self::Volume,
        Self::Mass,
        Self::Density,
        Self::Material,
        Self::BoundingBoxWidth,
        Self::BoundingBoxHeight,
        Self::BoundingBoxDepth,
    ];

    /// Unqualified field name.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::Area => "Area",
            Self::Volume => "Volume",
            Self::Mass => "Mass",
            Self::Density => "Density",
            Self::Material => "Material",
            Self::BoundingBoxWidth => "Width",
            Self::BoundingBoxHeight => "Height",
            Self::BoundingBoxDepth => "Depth",
        }
    }

    /// Unit label, if the field has one.
    #[must_use]
    pub const fn unit(self) -> Option<&'static str> {
        match self {
            Self::Id => Some("UUID"),
            Self::Area => Some("cm2"),
            Self::Volume => Some("cm3"),
            Self::Mass => Some("kg"),
            Self::Density => Some("kg/cm3"),
            Self::Material => None,
            Self::BoundingBoxWidth | Self::BoundingBoxHeight | Self::BoundingBoxDepth => {
                Some("cm")
            }
        }
    }

    const fn is_bounding_box(self) -> bool {
        matches!(
            self,
            Self::BoundingBoxWidth | Self::BoundingBoxHeight | Self::BoundingBoxDepth
        )
    }

    /// Fully qualified template name, e.g. `Fusion360:BoundingBox:Width`.
    #[must_use]
    pub fn canonical_name(self) -> String {
        if self.is_bounding_box() {
            format!(
                "{NAMESPACE}{SEPARATOR}{BOUNDING_BOX}{SEPARATOR}{}",
                self.field_name()
            )
        } else {
            format!("{NAMESPACE}{SEPARATOR}{}", self.field_name())
        }
    }
}

impl fmt::Display for FieldTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}

/// A template definition together with its remote identifier, if resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataTemplate {
    /// Fully qualified template name.
    pub canonical_name: String,
    /// Unit label.
    pub unit: Option<&'static str>,
    /// Catalog primary key, once cached.
    pub remote_id: Option<Pk>,
}

/// Template name to catalog record, filled by [`ensure_templates`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCache {
    by_name: HashMap<String, ParameterTemplate>,
}

impl TemplateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the given templates, keyed by name.
    pub fn populate(&mut self, templates: impl IntoIterator<Item = ParameterTemplate>) {
        for template in templates {
            self.by_name.insert(template.name.clone(), template);
        }
    }

    /// Looks up a template record by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterTemplate> {
        self.by_name.get(name)
    }

    /// Primary key of a field's template.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TemplateNotCached`] if the template is not cached.
    pub fn pk(&self, field: FieldTemplate) -> CatalogResult<Pk> {
        let name = field.canonical_name();
        self.by_name
            .get(&name)
            .map(|template| template.pk)
            .ok_or_else(|| CatalogError::template_not_cached(name))
    }

    /// Describes a field with its cached remote identifier.
    #[must_use]
    pub fn describe(&self, field: FieldTemplate) -> MetadataTemplate {
        MetadataTemplate {
            canonical_name: field.canonical_name(),
            unit: field.unit(),
            remote_id: self.pk(field).ok(),
        }
    }

    /// Number of cached templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Makes sure every `expected` template exists remotely, then refreshes `cache`.
///
/// Templates already present (matched by name) are never re-created or
/// modified, so calling this repeatedly is safe. Returns the number of
/// templates created.
///
/// # Errors
///
/// Returns the first remote failure; nothing is retried.
pub fn ensure_templates(
    catalog: &dyn Catalog,
    expected: &[FieldTemplate],
    cache: &mut TemplateCache,
) -> CatalogResult<usize> {
    let existing: HashSet<String> = catalog
        .list_templates()?
        .into_iter()
        .map(|template| template.name)
        .collect();

    let mut created = 0;
    for field in expected {
        let name = field.canonical_name();
        if existing.contains(&name) {
            continue;
        }

        catalog.create_template(&NewTemplate {
            name: name.clone(),
            units: field.unit().unwrap_or_default().to_string(),
        })?;
        tracing::info!(template = %name, "Created missing parameter template");
        created += 1;
    }

    cache.populate(catalog.list_templates()?);
    tracing::debug!(cached = cache.len(), created, "Template cache refreshed");

    Ok(created)
}

/// Stores `data` for `field` on a part as a new parameter.
///
/// # Errors
///
/// Returns an error if the template is not cached or the remote call fails.
pub fn create_parameter(
    catalog: &dyn Catalog,
    cache: &TemplateCache,
    part: Pk,
    field: FieldTemplate,
    data: &str,
) -> CatalogResult<Parameter> {
    let template = cache.pk(field)?;
    catalog.create_parameter(&NewParameter {
        part,
        template,
        data: data.to_string(),
    })
}

/// Replaces the value of the part's first parameter for `field`.
///
/// # Errors
///
/// Returns [`CatalogError::ParameterNotFound`] if the part has no such
/// parameter, or an error if the template is not cached or a remote call fails.
pub fn update_parameter(
    catalog: &dyn Catalog,
    cache: &TemplateCache,
    part: Pk,
    field: FieldTemplate,
    data: &str,
) -> CatalogResult<Parameter> {
    let template = cache.pk(field)?;
    let existing = find_parameter(catalog, part, template)?
        .ok_or(CatalogError::ParameterNotFound { part, template })?;
    catalog.update_parameter(existing.pk, data)
}

/// Updates the part's parameter for `field`, creating it if absent.
///
/// # Errors
///
/// Returns an error if the template is not cached or a remote call fails.
pub fn upsert_parameter(
    catalog: &dyn Catalog,
    cache: &TemplateCache,
    part: Pk,
    field: FieldTemplate,
    data: &str,
) -> CatalogResult<Parameter> {
    let template = cache.pk(field)?;
    match find_parameter(catalog, part, template)? {
        Some(existing) if existing.data == data => Ok(existing),
        Some(existing) => catalog.update_parameter(existing.pk, data),
        None => catalog.create_parameter(&NewParameter {
            part,
            template,
            data: data.to_string(),
        }),
    }
}

fn find_parameter(
    catalog: &dyn Catalog,
    part: Pk,
    template: Pk,
) -> CatalogResult<Option<Parameter>> {
    Ok(catalog
        .list_parameters()?
        .into_iter()
        .find(|parameter| parameter.part == part && parameter.template == template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    #[test]
    fn canonical_names() {
        assert_eq!(FieldTemplate::Id.canonical_name(), "Fusion360:Id");
        assert_eq!(FieldTemplate::Volume.canonical_name(), "Fusion360:Volume");
        assert_eq!(
            FieldTemplate::BoundingBoxDepth.canonical_name(),
            "Fusion360:BoundingBox:Depth"
        );
    }

    #[test]
    fn canonical_names_unique() {
        let names: HashSet<String> = FieldTemplate::ALL
            .iter()
            .map(|field| field.canonical_name())
            .collect();
        assert_eq!(names.len(), FieldTemplate::ALL.len());
        assert!(names.iter().all(|name| name.starts_with("Fusion360:")));
    }

    #[test]
    fn units() {
        assert_eq!(FieldTemplate::Density.unit(), Some("kg/cm3"));
        assert_eq!(FieldTemplate::Material.unit(), None);
    }

    #[test]
    fn ensure_creates_only_missing() {
        let catalog = InMemoryCatalog::new();
        catalog.add_template("Fusion360:Id", "UUID");
        catalog.add_template("Colour", "");

        let mut cache = TemplateCache::new();
        let created = ensure_templates(&catalog, &FieldTemplate::ALL, &mut cache).unwrap();

        assert_eq!(created, FieldTemplate::ALL.len() - 1);
        assert_eq!(cache.len(), FieldTemplate::ALL.len() + 1);
        assert_eq!(cache.pk(FieldTemplate::Id).unwrap(), 1);
        assert_eq!(cache.get("Fusion360:Material").unwrap().units, "");
    }

    #[test]
    fn pk_requires_cache() {
        let cache = TemplateCache::new();
        assert!(matches!(
            cache.pk(FieldTemplate::Mass),
            Err(CatalogError::TemplateNotCached { name }) if name == "Fusion360:Mass"
        ));
    }

    #[test]
    fn describe_reports_remote_id() {
        let catalog = InMemoryCatalog::new();
        let mut cache = TemplateCache::new();
        ensure_templates(&catalog, &[FieldTemplate::Volume], &mut cache).unwrap();

        let described = cache.describe(FieldTemplate::Volume);
        assert_eq!(described.canonical_name, "Fusion360:Volume");
        assert_eq!(described.unit, Some("cm3"));
        assert!(described.remote_id.is_some());
        assert!(cache.describe(FieldTemplate::Mass).remote_id.is_none());
    }

    #[test]
    fn update_without_parameter_fails() {
        let catalog = InMemoryCatalog::new();
        let mut cache = TemplateCache::new();
        ensure_templates(&catalog, &[FieldTemplate::Id], &mut cache).unwrap();

        let result = update_parameter(&catalog, &cache, 5, FieldTemplate::Id, "abc");
        assert!(matches!(result, Err(CatalogError::ParameterNotFound { part: 5, .. })));
    }

    #[test]
    fn upsert_creates_then_updates() {
        let catalog = InMemoryCatalog::new();
        let mut cache = TemplateCache::new();
        ensure_templates(&catalog, &[FieldTemplate::Volume], &mut cache).unwrap();

        let first = upsert_parameter(&catalog, &cache, 3, FieldTemplate::Volume, "1.5").unwrap();
        let second = upsert_parameter(&catalog, &cache, 3, FieldTemplate::Volume, "2.5").unwrap();

        assert_eq!(first.pk, second.pk);
        assert_eq!(catalog.parameters().len(), 1);
        assert_eq!(catalog.parameters()[0].data, "2.5");
        assert_eq!(catalog.calls().create_parameter, 1);
        assert_eq!(catalog.calls().update_parameter, 1);
    }

    #[test]
    fn upsert_same_value_is_noop() {
        let catalog = InMemoryCatalog::new();
        let mut cache = TemplateCache::new();
        ensure_templates(&catalog, &[FieldTemplate::Id], &mut cache).unwrap();

        create_parameter(&catalog, &cache, 1, FieldTemplate::Id, "abc").unwrap();
        upsert_parameter(&catalog, &cache, 1, FieldTemplate::Id, "abc").unwrap();
        assert_eq!(catalog.calls().update_parameter, 0);
    }
}
