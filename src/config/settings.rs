//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::catalog::ReferenceNames;
use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Catalog server profiles.
    pub server: ServerConfig,

    /// JSON snapshot used to seed the offline catalog.
    #[serde(default)]
    pub catalog_snapshot: Option<PathBuf>,

    /// Directories that design snapshots and exports must live under.
    #[serde(default)]
    pub allowed_paths: Vec<PathBuf>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let profile = self.active_profile()?;

        let required = [
            ("address", &profile.address),
            ("part_category", &profile.part_category),
            ("template_parameter", &profile.template_parameter),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField {
                    profile: self.server.current.clone(),
                    field,
                });
            }
        }

        Ok(())
    }

    /// The selected server profile.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.current` names an undefined profile.
    pub fn active_profile(&self) -> Result<&ServerProfile, ConfigError> {
        self.server
            .active()
            .ok_or_else(|| ConfigError::ProfileNotFound {
                profile: self.server.current.clone(),
            })
    }
}

/// Catalog server selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name of the active profile.
    #[serde(default = "default_profile_name")]
    pub current: String,

    /// Profiles by name.
    pub profiles: BTreeMap<String, ServerProfile>,
}

impl ServerConfig {
    /// The profile named by `current`, if defined.
    #[must_use]
    pub fn active(&self) -> Option<&ServerProfile> {
        self.profiles.get(&self.current)
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Connection details and reference names for one catalog server.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerProfile {
    /// Server address.
    pub address: String,

    /// API token.
    #[serde(default)]
    pub token: String,

    /// Display name of the part category for linked parts.
    pub part_category: String,

    /// Display name of the template that stores the host identifier.
    pub template_parameter: String,
}

impl ServerProfile {
    /// Reference names used for cached reference resolution.
    #[must_use]
    pub fn reference_names(&self) -> ReferenceNames {
        ReferenceNames {
            part_category: self.part_category.clone(),
            template_parameter: self.template_parameter.clone(),
        }
    }
}

impl fmt::Debug for ServerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerProfile")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("part_category", &self.part_category)
            .field("template_parameter", &self.template_parameter)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
