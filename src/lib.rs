//! npm Publish - exactly-once package publish ingestion
//!
//! Accepts an npm publish document for a project, rejects bad or oversized
//! input before any I/O, enforces publish protection rules, serializes
//! concurrent publishes of one version through a lease, and writes the
//! package with its tag, metadata, file and build records in one unit.

pub mod config;
pub mod lease;
pub mod metadata;
pub mod service;
pub mod store;
pub mod telemetry;

pub use config::{ConfigError, PublishSettings, ResolvedSettings};
pub use lease::{lease_key, FileLeaseBackend, LeaseBackend, LeaseCoordinator, LeaseError, MemoryLeaseBackend};
pub use metadata::{MetadataSanitizer, SizeViolation};
pub use service::{Actor, Project, PublishError, PublishRequest, PublishService};
pub use store::{ArtifactStore, MemoryStore, PublishWrite, StoreError};
pub use telemetry::{ErrorReporter, RecordingReporter, TracingReporter};

pub use publish_guard::{AccessLevel, ProtectionRule};
pub use publish_protocol::{PublishResult, Rejection, RejectionKind};
