//! Resolved settings with provenance.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::PublishSettings;
use super::merge::merge_layers;

/// Longest lease a publish may hold (one day).
const MAX_LEASE_TIMEOUT_SECONDS: u64 = 86_400;

/// Origin of a settings layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Override,
}

/// A contributing settings layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/override)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/override)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Settings plus the layers they were built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedSettings {
    pub settings: PublishSettings,
    pub sources: Vec<ConfigSource>,
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ResolvedSettings {
    /// Resolve settings from the built-in defaults, an optional TOML file and
    /// optional overrides.
    ///
    /// A missing file is skipped; an unreadable or malformed one is an error.
    pub fn resolve(config_path: Option<&Path>, overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![PublishSettings::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = config_path.filter(|p| p.exists()) {
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(overrides) = overrides {
            layers.push(overrides);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Override,
                path: None,
                digest: None,
            });
        }

        let settings: PublishSettings = serde_json::from_value(merge_layers(layers))
            .map_err(|e| ConfigError::ParseError(format!("invalid settings: {}", e)))?;
        Self::validate(&settings)?;

        tracing::debug!(
            layers = sources.len(),
            max_file_size = settings.max_file_size,
            protected_packages_enabled = settings.protected_packages_enabled,
            "resolved publish settings"
        );

        Ok(Self { settings, sources })
    }

    /// Parse a TOML file into a JSON layer and the digest of its bytes.
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)?;
        let digest = hex::encode(Sha256::digest(&bytes));

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
        let table: toml::Table = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;
        let value = serde_json::to_value(table)
            .map_err(|e| ConfigError::ParseError(format!("TOML conversion error: {}", e)))?;

        Ok((value, digest))
    }

    fn validate(settings: &PublishSettings) -> Result<(), ConfigError> {
        if settings.max_file_size == 0 {
            return Err(ConfigError::ValidationError("max_file_size must be positive".to_string()));
        }
        if settings.lease_timeout_seconds == 0 || settings.lease_timeout_seconds > MAX_LEASE_TIMEOUT_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "lease_timeout_seconds must be in (0, {}]",
                MAX_LEASE_TIMEOUT_SECONDS
            )));
        }
        if settings.metadata.max_size == 0 {
            return Err(ConfigError::ValidationError("metadata.max_size must be positive".to_string()));
        }
        if settings.metadata.report_limit == 0 {
            return Err(ConfigError::ValidationError(
                "metadata.report_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
