//! npm Publish Protocol Types
//!
//! Defines the inbound publish document, the records a publish creates and
//! the outcome handed back to the transport layer.

pub mod error;
pub mod outcome;
pub mod payload;
pub mod records;

pub use error::{Rejection, RejectionKind};
pub use outcome::PublishResult;
pub use payload::{AttachmentDescriptor, PayloadError, PublishPayload};
pub use records::{
    Artifact, ArtifactStatus, BuildInfo, MetadataDocument, NewArtifact, PackageFile, PackageType,
    VersionTag,
};

/// Tag assigned when the publish document carries no dist-tag for the version.
pub const DEFAULT_DIST_TAG: &str = "latest";
