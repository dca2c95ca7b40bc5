//! Records created by a publish.
//!
//! A successful publish writes one artifact together with its version tag,
//! metadata document, package file and, when the request came from a CI job,
//! its build info.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registry kind a package belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Npm,
}

/// Lifecycle status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Visible and installable.
    Active,
    /// Scheduled for removal; does not block a new publish of the same version.
    PendingDestruction,
}

impl ArtifactStatus {
    /// Check if this status counts toward the uniqueness invariant.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A stored package version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Storage-assigned identifier.
    pub id: u64,
    /// Owning project.
    pub project_id: u64,
    /// Package name, scoped (`@scope/name`) or unscoped.
    pub name: String,
    /// Semantic version string.
    pub version: String,
    /// Registry kind.
    pub package_type: PackageType,
    /// Lifecycle status.
    pub status: ArtifactStatus,
    /// Actor that published this version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<u64>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// An artifact that has not been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArtifact {
    pub project_id: u64,
    pub name: String,
    pub version: String,
    pub package_type: PackageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<u64>,
}

/// Dist-tag pointing at the freshly created artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    /// Tag name, e.g. `latest`.
    pub name: String,
}

/// Sanitized `package.json` stored alongside the artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDocument(pub Map<String, Value>);

impl MetadataDocument {
    /// Look up a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Check if a top-level field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of top-level fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for MetadataDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Link between an artifact and the CI job that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Pipeline the job ran in.
    pub pipeline_id: u64,
    /// The job itself.
    pub job_id: u64,
}

/// Decoded package tarball handed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageFile {
    /// `<name>-<version>.tgz`
    pub file_name: String,
    /// Decoded size in bytes.
    pub size: u64,
    /// SHA-256 hex of the decoded bytes.
    pub sha256: String,
    /// SHA-1 hex declared by the client in `dist.shasum`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
    /// Decoded bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}
