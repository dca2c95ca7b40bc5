//! In-memory package store.
//!
//! Enforces the same uniqueness constraint as the relational schema: one
//! active package per (project, type, name, version). Failure injection
//! lets tests drive the write path into each error branch.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use publish_protocol::{
    Artifact, ArtifactStatus, BuildInfo, MetadataDocument, NewArtifact, PackageFile, PackageType, VersionTag,
};

use super::{ArtifactStore, PublishWrite, StoreError, StoreResult};

/// A package and the records written with it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPackage {
    pub artifact: Artifact,
    pub tag: Option<VersionTag>,
    pub metadata: Option<MetadataDocument>,
    pub package_file: Option<PackageFile>,
    pub build_info: Option<BuildInfo>,
}

/// Failure to raise from the next `create_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Uniqueness violation regardless of stored state.
    ConstraintViolation,
    /// Record validation error with this detail.
    RecordInvalid(String),
    /// Backend outage.
    Unavailable,
}

/// Failure injection configuration.
#[derive(Debug, Clone, Default)]
pub struct FailureInjection {
    /// Fail the next `create_all` call, then clear.
    pub create_failure: Option<InjectedFailure>,
    /// Report no active packages from `exists_active`, as a stale read would.
    pub stale_exists_check: bool,
    /// Hold each `create_all` for this long before committing.
    pub write_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    packages: Vec<StoredPackage>,
    failure_injection: FailureInjection,
    next_id: u64,
    create_calls: usize,
}

/// Thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryStoreInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configure failure injection.
    pub fn set_failure_injection(&self, injection: FailureInjection) {
        self.write().failure_injection = injection;
    }

    /// Insert a package directly, bypassing the publish path.
    pub fn insert_existing(&self, artifact: NewArtifact, status: ArtifactStatus) -> Artifact {
        let mut inner = self.write();
        let artifact = inner.next_artifact(artifact, status);
        inner.packages.push(StoredPackage {
            artifact: artifact.clone(),
            tag: None,
            metadata: None,
            package_file: None,
            build_info: None,
        });
        artifact
    }

    /// Change a package's lifecycle status. Returns false if unknown.
    pub fn set_status(&self, id: u64, status: ArtifactStatus) -> bool {
        let mut inner = self.write();
        match inner.packages.iter_mut().find(|p| p.artifact.id == id) {
            Some(package) => {
                package.artifact.status = status;
                true
            }
            None => false,
        }
    }

    /// Every stored package with this key, any status.
    pub fn find(&self, project_id: u64, name: &str, version: &str) -> Vec<StoredPackage> {
        self.read()
            .packages
            .iter()
            .filter(|p| p.artifact.project_id == project_id && p.artifact.name == name && p.artifact.version == version)
            .cloned()
            .collect()
    }

    /// Number of stored packages.
    pub fn package_count(&self) -> usize {
        self.read().packages.len()
    }

    /// Number of stored version tags.
    pub fn tag_count(&self) -> usize {
        self.read().packages.iter().filter(|p| p.tag.is_some()).count()
    }

    /// Number of stored metadata documents.
    pub fn metadata_count(&self) -> usize {
        self.read().packages.iter().filter(|p| p.metadata.is_some()).count()
    }

    /// Number of stored package files.
    pub fn package_file_count(&self) -> usize {
        self.read().packages.iter().filter(|p| p.package_file.is_some()).count()
    }

    /// Number of stored build-info records.
    pub fn build_info_count(&self) -> usize {
        self.read().packages.iter().filter(|p| p.build_info.is_some()).count()
    }

    /// Number of `create_all` calls, successful or not.
    pub fn create_calls(&self) -> usize {
        self.read().create_calls
    }
}

impl MemoryStoreInner {
    fn next_artifact(&mut self, new: NewArtifact, status: ArtifactStatus) -> Artifact {
        self.next_id += 1;
        Artifact {
            id: self.next_id,
            project_id: new.project_id,
            name: new.name,
            version: new.version,
            package_type: new.package_type,
            status,
            creator_id: new.creator_id,
            created_at: Utc::now(),
        }
    }

    fn has_active(&self, project_id: u64, package_type: PackageType, name: &str, version: &str) -> bool {
        self.packages.iter().any(|p| {
            p.artifact.status.is_active()
                && p.artifact.project_id == project_id
                && p.artifact.package_type == package_type
                && p.artifact.name == name
                && p.artifact.version == version
        })
    }
}

impl ArtifactStore for MemoryStore {
    fn exists_active(&self, project_id: u64, package_type: PackageType, name: &str, version: &str) -> StoreResult<bool> {
        let inner = self.read();
        if inner.failure_injection.stale_exists_check {
            return Ok(false);
        }
        Ok(inner.has_active(project_id, package_type, name, version))
    }

    fn create_all(&self, write: PublishWrite) -> StoreResult<Artifact> {
        let delay = {
            let mut inner = self.write();
            inner.create_calls += 1;
            inner.failure_injection.write_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut inner = self.write();

        if let Some(failure) = inner.failure_injection.create_failure.take() {
            return Err(match failure {
                InjectedFailure::ConstraintViolation => StoreError::ConstraintViolation {
                    detail: "Package already exists".to_string(),
                },
                InjectedFailure::RecordInvalid(detail) => StoreError::RecordInvalid { detail },
                InjectedFailure::Unavailable => StoreError::Unavailable("connection refused".to_string()),
            });
        }

        let PublishWrite {
            artifact,
            tag,
            metadata,
            package_file,
            build_info,
        } = write;

        if inner.has_active(artifact.project_id, artifact.package_type, &artifact.name, &artifact.version) {
            return Err(StoreError::ConstraintViolation {
                detail: "Package already exists".to_string(),
            });
        }

        let artifact = inner.next_artifact(artifact, ArtifactStatus::Active);
        inner.packages.push(StoredPackage {
            artifact: artifact.clone(),
            tag: Some(tag),
            metadata: Some(metadata),
            package_file: Some(package_file),
            build_info,
        });
        Ok(artifact)
    }
}
