//! Cached resolution of configured catalog references.
//!
//! Some catalog records are referred to by a display name set in the
//! configuration (the category new parts go into, the template that stores
//! the host identifier). Resolving one lists the whole collection once and
//! caches the first record whose name matches; later lookups make no remote
//! call. The cache is never invalidated during a session.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::{Catalog, CatalogError, CatalogResult, ParameterTemplate, PartCategory};

/// Logical reference names understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// The part category used for linked parts.
    PartCategory,
    /// The template parameter that stores the host identifier.
    TemplateParameter,
}

impl ReferenceKind {
    /// Configuration key of this reference.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PartCategory => "part_category",
            Self::TemplateParameter => "template_parameter",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> CatalogResult<Self> {
        match s {
            "part_category" => Ok(Self::PartCategory),
            "template_parameter" => Ok(Self::TemplateParameter),
            other => Err(CatalogError::unknown_reference(other)),
        }
    }
}

/// Configured display names for each reference kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceNames {
    /// Name of the part category.
    pub part_category: String,
    /// Name of the template parameter.
    pub template_parameter: String,
}

impl ReferenceNames {
    /// Display name configured for `kind`.
    #[must_use]
    pub fn display_name(&self, kind: ReferenceKind) -> &str {
        match kind {
            ReferenceKind::PartCategory => &self.part_category,
            ReferenceKind::TemplateParameter => &self.template_parameter,
        }
    }
}

/// A resolved catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference {
    /// A part category.
    Category(PartCategory),
    /// A parameter template.
    Template(ParameterTemplate),
}

impl Reference {
    /// Name of the referenced record.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Category(category) => &category.name,
            Self::Template(template) => &template.name,
        }
    }
}

/// Resolved references, keyed by kind.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    entries: HashMap<ReferenceKind, Reference>,
}

impl ReferenceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached reference for `kind`, if resolved.
    #[must_use]
    pub fn get(&self, kind: ReferenceKind) -> Option<&Reference> {
        self.entries.get(&kind)
    }

    /// Number of resolved references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves a reference, consulting `cache` first.
///
/// Returns `Ok(None)` if no record carries the configured name. Misses are
/// not cached, so a later call lists the collection again.
///
/// # Errors
///
/// Returns an error if the remote list call fails.
pub fn resolve_reference(
    catalog: &dyn Catalog,
    names: &ReferenceNames,
    cache: &mut ReferenceCache,
    kind: ReferenceKind,
) -> CatalogResult<Option<Reference>> {
    if let Some(cached) = cache.entries.get(&kind) {
        tracing::debug!(reference = %kind, "Reference cache hit");
        return Ok(Some(cached.clone()));
    }

    let wanted = names.display_name(kind);
    let found = match kind {
        ReferenceKind::PartCategory => catalog
            .list_categories()?
            .into_iter()
            .find(|category| category.name == wanted)
            .map(Reference::Category),
        ReferenceKind::TemplateParameter => catalog
            .list_templates()?
            .into_iter()
            .find(|template| template.name == wanted)
            .map(Reference::Template),
    };

    match found {
        Some(reference) => {
            tracing::debug!(reference = %kind, name = wanted, "Reference resolved");
            cache.entries.insert(kind, reference.clone());
            Ok(Some(reference))
        }
        None => {
            tracing::debug!(reference = %kind, name = wanted, "Reference not found");
            Ok(None)
        }
    }
}
