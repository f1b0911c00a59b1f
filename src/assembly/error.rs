//! Error types for assembly graph access.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for assembly operations.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Errors that can occur while reading or traversing an assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Failed to open or read the design snapshot.
    #[error("Failed to read design snapshot: {path}")]
    SnapshotRead {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The design snapshot is not valid JSON or does not match the expected shape.
    #[error("Failed to parse design snapshot: {path}")]
    SnapshotParse {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An occurrence (or the root) refers to a component the design does not define.
    #[error("Unknown component: {id}")]
    UnknownComponent {
        /// Component identifier that could not be resolved.
        id: String,
    },

    /// Two components in one design share an identifier.
    #[error("Duplicate component id: {id}")]
    DuplicateComponent {
        /// The repeated identifier.
        id: String,
    },
}

impl AssemblyError {
    /// Creates a snapshot read error.
    pub fn snapshot_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SnapshotRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a snapshot parse error.
    pub fn snapshot_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::SnapshotParse {
            path: path.into(),
            source,
        }
    }

    /// Creates an unknown component error.
    pub fn unknown_component(id: impl Into<String>) -> Self {
        Self::UnknownComponent { id: id.into() }
    }
}
