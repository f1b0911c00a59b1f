//! Configuration errors.
//!
//! Messages name profiles and fields, never their values, so the catalog
//! auth token cannot leak through an error.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file at the given or default location.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Where the file was looked for.
        path: PathBuf,
    },

    #[error("failed to read configuration file: {path}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file: {path}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `server.current` selects a profile that is not in `server.profiles`.
    #[error("server profile '{profile}' is not defined")]
    ProfileNotFound {
        /// The selected profile name.
        profile: String,
    },

    /// A required profile field is blank.
    #[error("server profile '{profile}': '{field}' must not be empty")]
    EmptyField {
        /// The profile being validated.
        profile: String,
        /// Name of the blank field.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_path() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn empty_field_names_profile_and_field() {
        let error = ConfigError::EmptyField {
            profile: "lab".to_string(),
            field: "address",
        };
        assert_eq!(
            error.to_string(),
            "server profile 'lab': 'address' must not be empty"
        );
    }
}
