//! In-process lease backend with TTL expiry.
//!
//! Serializes publishes within one process. Suitable for single-node
//! deployments and tests; multi-host deployments need a shared backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use ulid::Ulid;

use super::{LeaseBackend, LeaseError, LeaseHandle, LeaseResult};

#[derive(Debug, Clone)]
struct HeldLease {
    token: Ulid,
    deadline: Instant,
}

impl HeldLease {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Thread-safe in-memory lease table.
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseBackend {
    leases: Arc<Mutex<HashMap<String, HeldLease>>>,
}

impl MemoryLeaseBackend {
    /// Create an empty lease table.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, HeldLease>> {
        // A panic while holding the table cannot leave it half-updated.
        self.leases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if `key` is currently held by an unexpired lease.
    pub fn is_held(&self, key: &str) -> bool {
        let now = Instant::now();
        self.table().get(key).map(|l| !l.is_expired(now)).unwrap_or(false)
    }

    /// Count of unexpired leases.
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.table().values().filter(|l| !l.is_expired(now)).count()
    }
}

impl LeaseBackend for MemoryLeaseBackend {
    fn acquire(&self, key: &str, timeout: Duration) -> LeaseResult<LeaseHandle> {
        let now = Instant::now();
        let mut table = self.table();

        if table.get(key).is_some_and(|held| !held.is_expired(now)) {
            return Err(LeaseError::Contention { key: key.to_string() });
        }

        let deadline = now
            .checked_add(timeout)
            .ok_or_else(|| LeaseError::Backend(format!("lease timeout {:?} is out of range", timeout)))?;

        let handle = LeaseHandle::new(key, timeout);
        table.insert(
            key.to_string(),
            HeldLease {
                token: handle.token,
                deadline,
            },
        );
        Ok(handle)
    }

    fn release(&self, handle: &LeaseHandle) -> LeaseResult<()> {
        let mut table = self.table();
        if table.get(&handle.key).is_some_and(|held| held.token == handle.token) {
            table.remove(&handle.key);
        }
        Ok(())
    }
}
