//! Error types for remote catalog operations.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::Pk;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Boxed cause of a failed remote call.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur while talking to the parts catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A remote call failed (network, authentication or server error).
    #[error("Catalog request '{operation}' failed")]
    Request {
        /// Name of the remote operation.
        operation: &'static str,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// The catalog client could not be created.
    #[error("Failed to connect to catalog at {address}")]
    Connect {
        /// Server address from the active profile.
        address: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// A logical reference name has no resolution rule.
    #[error("Unknown reference: {name}")]
    UnknownReference {
        /// The logical name that was requested.
        name: String,
    },

    /// A metadata template's remote identifier is not cached yet.
    #[error("Template not cached: {name} (ensure templates first)")]
    TemplateNotCached {
        /// Canonical template name.
        name: String,
    },

    /// No parameter binds the given part and template.
    #[error("No parameter for part {part} and template {template}")]
    ParameterNotFound {
        /// Part primary key.
        part: Pk,
        /// Template primary key.
        template: Pk,
    },

    /// A catalog snapshot file could not be read.
    #[error("Failed to read catalog snapshot: {path}")]
    SnapshotRead {
        /// Path to the snapshot.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A catalog snapshot file could not be parsed.
    #[error("Failed to parse catalog snapshot: {path}")]
    SnapshotParse {
        /// Path to the snapshot.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    /// Creates a remote request error.
    pub fn request(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Request {
            operation,
            source: source.into(),
        }
    }

    /// Creates a connection error.
    pub fn connect(address: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connect {
            address: address.into(),
            source: source.into(),
        }
    }

    /// Creates an unknown reference error.
    pub fn unknown_reference(name: impl Into<String>) -> Self {
        Self::UnknownReference { name: name.into() }
    }

    /// Creates a template-not-cached error.
    pub fn template_not_cached(name: impl Into<String>) -> Self {
        Self::TemplateNotCached { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_keeps_cause() {
        let err = CatalogError::request("list_parameters", "connection reset");
        assert_eq!(err.to_string(), "Catalog request 'list_parameters' failed");
        assert_eq!(err.source().unwrap().to_string(), "connection reset");
    }

    #[test]
    fn unknown_reference_display() {
        let err = CatalogError::unknown_reference("supplier");
        assert_eq!(err.to_string(), "Unknown reference: supplier");
    }
}
