//! Package storage.
//!
//! The relational store is consumed only through two calls: an existence
//! check for an active package version, and one atomic write of every
//! record a publish creates.

mod memory;

use publish_protocol::{Artifact, BuildInfo, MetadataDocument, NewArtifact, PackageFile, PackageType, VersionTag};
use thiserror::Error;

pub use memory::{FailureInjection, InjectedFailure, MemoryStore, StoredPackage};

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The uniqueness constraint on active package versions fired.
    #[error("Validation failed: {detail}")]
    ConstraintViolation { detail: String },

    /// A record failed validation for a reason unrelated to uniqueness.
    #[error("Validation failed: {detail}")]
    RecordInvalid { detail: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Everything one publish writes, committed together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishWrite {
    pub artifact: NewArtifact,
    pub tag: VersionTag,
    pub metadata: MetadataDocument,
    pub package_file: PackageFile,
    pub build_info: Option<BuildInfo>,
}

/// Package storage consumed by the publish service.
pub trait ArtifactStore: Send + Sync {
    /// Check for an active package with this key.
    fn exists_active(&self, project_id: u64, package_type: PackageType, name: &str, version: &str) -> StoreResult<bool>;

    /// Write all records of a publish atomically.
    fn create_all(&self, write: PublishWrite) -> StoreResult<Artifact>;
}
