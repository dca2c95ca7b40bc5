//! Publish leases.
//!
//! Concurrent publishes of one package version may come from different
//! processes or hosts, so they are serialized through an external lease
//! rather than an in-process lock. The backend is pluggable; the
//! coordinator derives keys and guarantees release.

mod file;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use ulid::Ulid;

pub use file::FileLeaseBackend;
pub use memory::MemoryLeaseBackend;

/// Prefix shared by every npm publish lease key.
pub const LEASE_KEY_PREFIX: &str = "packages:npm:create_package_service:packages";

/// Lease result type
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Errors from lease operations
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease '{key}' is held by another attempt")]
    Contention { key: String },

    #[error("lease backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Proof of holding a lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseHandle {
    /// The leased key.
    pub key: String,
    /// Unique per acquisition; release only succeeds with the matching token.
    pub token: Ulid,
    /// Lifetime granted by the backend.
    pub ttl: Duration,
}

impl LeaseHandle {
    /// Create a handle with a fresh token.
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            token: Ulid::new(),
            ttl,
        }
    }
}

/// An exclusive, time-bounded lease store.
pub trait LeaseBackend: Send + Sync {
    /// Take the lease on `key` for at most `timeout`.
    ///
    /// A single attempt: returns [`LeaseError::Contention`] when the key is
    /// already held instead of waiting for it.
    fn acquire(&self, key: &str, timeout: Duration) -> LeaseResult<LeaseHandle>;

    /// Give the lease back. Idempotent; a lease that expired and was taken
    /// by someone else is left alone.
    fn release(&self, handle: &LeaseHandle) -> LeaseResult<()>;
}

/// Lease key for one package version in one project.
pub fn lease_key(project_id: u64, name: &str, version: &str) -> String {
    format!("{}:{}_{}_{}", LEASE_KEY_PREFIX, project_id, name, version)
}

/// Runs work while holding a lease.
#[derive(Clone)]
pub struct LeaseCoordinator {
    backend: Arc<dyn LeaseBackend>,
}

impl LeaseCoordinator {
    /// Create a coordinator over a backend.
    pub fn new(backend: Arc<dyn LeaseBackend>) -> Self {
        Self { backend }
    }

    /// Run `body` while holding the lease on `key`.
    ///
    /// The lease is released when `body` returns or unwinds. Contention is
    /// returned to the caller without retrying.
    pub fn with_lease<T>(&self, key: &str, timeout: Duration, body: impl FnOnce() -> T) -> LeaseResult<T> {
        let handle = self.backend.acquire(key, timeout)?;
        debug!(lease_key = key, token = %handle.token, "lease acquired");

        let _guard = ReleaseGuard {
            backend: self.backend.as_ref(),
            handle,
        };
        Ok(body())
    }
}

/// Releases a lease on drop.
struct ReleaseGuard<'a> {
    backend: &'a dyn LeaseBackend,
    handle: LeaseHandle,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        match self.backend.release(&self.handle) {
            Ok(()) => debug!(lease_key = %self.handle.key, "lease released"),
            // The backend expires the lease on its own after the timeout.
            Err(e) => warn!(lease_key = %self.handle.key, error = %e, "lease release failed"),
        }
    }
}
