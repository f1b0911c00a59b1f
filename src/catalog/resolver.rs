//! Part resolver.
//!
//! Parts are found by an identifier stored as a parameter value (normally the
//! host component id in the `Fusion360:Id` template). One parameter listing
//! serves a whole batch of lookups.

use indexmap::IndexMap;
use serde::Serialize;

use super::{Catalog, CatalogResult, Parameter, Part, Pk};
use crate::report::{self, ErrorSink};

/// Outcome of looking up one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartLookup {
    /// Exactly one parameter holds the identifier.
    Found {
        /// The referenced part.
        part: Part,
    },
    /// No parameter holds the identifier.
    Missing,
    /// More than one parameter holds the identifier.
    Ambiguous {
        /// Parts of every matching parameter, in listing order.
        parts: Vec<Pk>,
    },
}

impl PartLookup {
    /// The part, if exactly one was found. Missing and ambiguous both give `None`.
    #[must_use]
    pub const fn part(&self) -> Option<Part> {
        match self {
            Self::Found { part } => Some(*part),
            Self::Missing | Self::Ambiguous { .. } => None,
        }
    }

    /// Returns true if exactly one part was found.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Scans `parameters` for values equal to `id`.
#[must_use]
pub fn search(parameters: &[Parameter], id: &str) -> PartLookup {
    let parts: Vec<Pk> = parameters
        .iter()
        .filter(|parameter| parameter.data == id)
        .map(|parameter| parameter.part)
        .collect();

    match parts.as_slice() {
        [] => PartLookup::Missing,
        [pk] => PartLookup::Found {
            part: Part { pk: *pk },
        },
        _ => PartLookup::Ambiguous { parts },
    }
}

/// Looks up the part referencing `id`.
///
/// # Errors
///
/// Returns the remote failure after reporting it to `sink`.
pub fn find_part(
    catalog: &dyn Catalog,
    id: &str,
    sink: &dyn ErrorSink,
) -> CatalogResult<PartLookup> {
    let parameters = catalog
        .list_parameters()
        .map_err(|e| report::capture(sink, e))?;
    Ok(search(&parameters, id))
}

/// Looks up several identifiers with a single parameter listing.
///
/// The result has one key per distinct input id, in input order.
///
/// # Errors
///
/// Returns the remote failure after reporting it to `sink`.
pub fn find_parts<S: AsRef<str>>(
    catalog: &dyn Catalog,
    ids: &[S],
    sink: &dyn ErrorSink,
) -> CatalogResult<IndexMap<String, PartLookup>> {
    let parameters = catalog
        .list_parameters()
        .map_err(|e| report::capture(sink, e))?;

    let results: IndexMap<String, PartLookup> = ids
        .iter()
        .map(|id| (id.as_ref().to_string(), search(&parameters, id.as_ref())))
        .collect();

    tracing::debug!(
        ids = ids.len(),
        found = results.values().filter(|lookup| lookup.is_found()).count(),
        "Resolved parts"
    );

    Ok(results)
}
