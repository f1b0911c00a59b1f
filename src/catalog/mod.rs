//! Remote parts catalog.
//!
//! The catalog holds four record kinds:
//!
//! - **Part categories**: named groups of parts
//! - **Parameter templates**: named, unit-carrying metadata fields
//! - **Parameters**: per-part values bound to a template
//! - **Parts**: owned by the catalog; only referenced here by primary key
//!
//! The [`Catalog`] trait is the seam to the catalog client. All queries are
//! full list fetches; filtering happens locally. Calls block until the
//! remote answers and are never retried.
//!
//! # Submodules
//!
//! - [`templates`]: the fixed metadata template set and its identifier cache
//! - [`references`]: cached lookup of configured category/template references
//! - [`resolver`]: finding parts by an identifier stored in a parameter value

pub mod error;
mod memory;
pub mod references;
pub mod resolver;
pub mod templates;

pub use error::{BoxError, CatalogError, CatalogResult};
pub use memory::{CallCounts, InMemoryCatalog};
pub use references::{Reference, ReferenceCache, ReferenceKind, ReferenceNames};
pub use resolver::PartLookup;
pub use templates::{FieldTemplate, MetadataTemplate, TemplateCache};

use serde::{Deserialize, Serialize};

/// Catalog primary key.
pub type Pk = u64;

/// A part category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartCategory {
    /// Primary key.
    pub pk: Pk,
    /// Display name.
    pub name: String,
}

/// A metadata (parameter) template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterTemplate {
    /// Primary key.
    pub pk: Pk,
    /// Template name.
    pub name: String,
    /// Unit label (may be empty).
    #[serde(default)]
    pub units: String,
}

/// A parameter value bound to a part and a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Primary key.
    pub pk: Pk,
    /// Primary key of the part.
    pub part: Pk,
    /// Primary key of the template.
    pub template: Pk,
    /// Stored value.
    pub data: String,
}

/// Reference to a part record owned by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Part {
    /// Primary key.
    pub pk: Pk,
}

/// Fields for creating a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTemplate {
    /// Template name.
    pub name: String,
    /// Unit label (empty for none).
    pub units: String,
}

/// Fields for creating a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameter {
    /// Primary key of the part.
    pub part: Pk,
    /// Primary key of the template.
    pub template: Pk,
    /// Value to store.
    pub data: String,
}

/// Client for the remote parts catalog.
///
/// Implementations perform one remote round trip per call.
pub trait Catalog {
    /// Lists all parameter templates.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Request`] if the remote call fails.
    fn list_templates(&self) -> CatalogResult<Vec<ParameterTemplate>>;

    /// Creates a parameter template.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Request`] if the remote call fails.
    fn create_template(&self, template: &NewTemplate) -> CatalogResult<ParameterTemplate>;

    /// Lists all parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Request`] if the remote call fails.
    fn list_parameters(&self) -> CatalogResult<Vec<Parameter>>;

    /// Creates a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Request`] if the remote call fails.
    fn create_parameter(&self, parameter: &NewParameter) -> CatalogResult<Parameter>;

    /// Replaces the value of an existing parameter.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Request`] if the remote call fails.
    fn update_parameter(&self, pk: Pk, data: &str) -> CatalogResult<Parameter>;

    /// Lists all part categories.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Request`] if the remote call fails.
    fn list_categories(&self) -> CatalogResult<Vec<PartCategory>>;
}
