//! JSON design snapshot host.
//!
//! A snapshot is a JSON export of the CAD application's active document:
//!
//! ```json
//! {
//!   "design": {
//!     "root": "root-id",
//!     "components": [
//!       { "id": "root-id", "name": "Assembly" },
//!       { "id": "bolt-id", "name": "Bolt", "part_number": "M3x8",
//!         "bodies": [{ "is_solid": true, "volume": 0.12 }] }
//!     ],
//!     "occurrences": [
//!       { "component": "bolt-id", "is_referenced_component": false, "children": [] }
//!     ]
//!   }
//! }
//! ```
//!
//! A missing or `null` `design` means no assembly is open.

use std::cell::RefCell;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AssemblyError, AssemblyHost, AssemblyResult, Design};

/// A user-facing notice raised by a core operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Short title (usually the operation name).
    pub title: String,
    /// Message body.
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    design: Option<Design>,
}

/// An [`AssemblyHost`] backed by a design snapshot.
///
/// Notices are collected rather than displayed so the caller can surface them.
#[derive(Debug, Default)]
pub struct SnapshotHost {
    design: Option<Design>,
    notices: RefCell<Vec<Notice>>,
}

impl SnapshotHost {
    /// Creates a host with the given active design.
    #[must_use]
    pub fn new(design: Option<Design>) -> Self {
        Self {
            design,
            notices: RefCell::new(Vec::new()),
        }
    }

    /// Opens a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> AssemblyResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| AssemblyError::snapshot_read(path, e))?;
        let file: SnapshotFile =
            serde_json::from_str(&contents).map_err(|e| AssemblyError::snapshot_parse(path, e))?;

        tracing::debug!(
            path = %path.display(),
            has_design = file.design.is_some(),
            "Loaded design snapshot"
        );

        Ok(Self::new(file.design))
    }

    /// Notices raised so far, in order.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    /// Removes and returns the collected notices.
    pub fn take_notices(&self) -> Vec<Notice> {
        self.notices.take()
    }
}

impl AssemblyHost for SnapshotHost {
    fn active_design(&self) -> Option<&Design> {
        self.design.as_ref()
    }

    fn notify(&self, title: &str, message: &str) {
        tracing::warn!(title, message, "User notice");
        self.notices.borrow_mut().push(Notice {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}
