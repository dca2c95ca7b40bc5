//! Built-in publish defaults (layer 1).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `package.json` fields that are managed by the registry and never stored.
pub const DEFAULT_NOT_ALLOWED_FIELDS: &[&str] =
    &["readme", "readmeFilename", "licenseText", "contributors", "exports"];

/// Settings for one publish service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishSettings {
    /// Largest decoded tarball accepted, in bytes (default: 500 MiB).
    pub max_file_size: u64,

    /// Lifetime of a publish lease in seconds (default: 3600).
    pub lease_timeout_seconds: u64,

    /// Enforce package protection rules (default: true).
    pub protected_packages_enabled: bool,

    /// Metadata document bounds.
    pub metadata: MetadataSettings,
}

/// Bounds on the stored `package.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSettings {
    /// Largest compact-JSON document accepted, in bytes (default: 20000).
    pub max_size: usize,

    /// Fields at or below this size are left out of size reports (default: 5000).
    pub report_floor: usize,

    /// Most fields named in one size report (default: 5).
    pub report_limit: usize,

    /// Top-level fields dropped before storage.
    pub disallowed_fields: Vec<String>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            max_file_size: 500 * 1024 * 1024,
            lease_timeout_seconds: 3600,
            protected_packages_enabled: true,
            metadata: MetadataSettings::default(),
        }
    }
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            max_size: 20_000,
            report_floor: 5_000,
            report_limit: 5,
            disallowed_fields: DEFAULT_NOT_ALLOWED_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl PublishSettings {
    /// Lease lifetime as a duration.
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_seconds)
    }

    /// Convert to a JSON value for merging.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "max_file_size": self.max_file_size,
            "lease_timeout_seconds": self.lease_timeout_seconds,
            "protected_packages_enabled": self.protected_packages_enabled,
            "metadata": {
                "max_size": self.metadata.max_size,
                "report_floor": self.metadata.report_floor,
                "report_limit": self.metadata.report_limit,
                "disallowed_fields": self.metadata.disallowed_fields,
            }
        })
    }
}
