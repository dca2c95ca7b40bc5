//! Publish orchestration.
//!
//! One publish moves through `Validating → Authorizing → Leasing → Writing`
//! and ends `Committed`, `Rejected` or `Conflicted`. The cheap checks run
//! before the lease is taken; decoding and every write happen under it.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use publish_guard::{
    check_attachment_size, validate, AccessLevel, Authorization, DeniedBy, IdentityError, ProtectionEngine,
    ProtectionRule, SizeError,
};
use publish_protocol::{
    Artifact, AttachmentDescriptor, BuildInfo, NewArtifact, PackageFile, PackageType, PayloadError, PublishPayload,
    PublishResult, Rejection, RejectionKind, VersionTag,
};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PublishSettings;
use crate::lease::{lease_key, LeaseBackend, LeaseCoordinator, LeaseError};
use crate::metadata::{MetadataSanitizer, SizeViolation};
use crate::store::{ArtifactStore, PublishWrite, StoreError};
use crate::telemetry::ErrorReporter;

/// The project a package is published into.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: u64,
    pub protection_rules: Vec<ProtectionRule>,
}

impl Project {
    /// A project without protection rules.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            protection_rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: ProtectionRule) -> Self {
        self.protection_rules.push(rule);
        self
    }
}

/// The authenticated publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User id; `None` for deploy tokens and job tokens without a user.
    pub id: Option<u64>,
    pub access_level: AccessLevel,
}

impl Actor {
    pub fn new(id: Option<u64>, access_level: AccessLevel) -> Self {
        Self { id, access_level }
    }
}

/// One inbound publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub name: String,
    /// Empty when the document carried no version.
    pub version: String,
    /// The version's `package.json`, unsanitized.
    pub metadata: Map<String, Value>,
    pub dist_tag: String,
    /// Missing attachments are represented as empty ones.
    pub attachment: AttachmentDescriptor,
    pub build: Option<BuildInfo>,
}

impl PublishRequest {
    /// Decode an npm publish document.
    pub fn from_npm_payload(bytes: &[u8]) -> Result<Self, PayloadError> {
        PublishPayload::from_slice(bytes).map(Self::from)
    }

    /// Attach the build that produced the package.
    pub fn with_build(mut self, build: BuildInfo) -> Self {
        self.build = Some(build);
        self
    }
}

impl From<PublishPayload> for PublishRequest {
    fn from(payload: PublishPayload) -> Self {
        Self {
            name: payload.name,
            version: payload.version.unwrap_or_default(),
            metadata: payload.metadata,
            dist_tag: payload.dist_tag,
            attachment: payload.attachment.unwrap_or_default(),
            build: None,
        }
    }
}

/// Why a publish did not commit.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Version is empty.")]
    EmptyVersion,

    #[error("Validation failed: {0}")]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Attachment(#[from] SizeError),

    #[error("Attachment data is not valid base64: {0}")]
    InvalidAttachment(#[from] base64::DecodeError),

    #[error("Package protected.")]
    Protected { rules: Vec<DeniedBy> },

    #[error("Could not obtain package lease. Please try again.")]
    Lease(#[source] LeaseError),

    #[error("Package already exists.")]
    AlreadyExists,

    #[error(transparent)]
    MetadataTooLarge(#[from] SizeViolation),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PublishError {
    /// Rejection kind reported to the caller.
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::Payload(_) => RejectionKind::InvalidPayload,
            Self::EmptyVersion => RejectionKind::EmptyVersion,
            Self::Identity(_) => RejectionKind::InvalidIdentity,
            Self::Attachment(SizeError::Empty) => RejectionKind::EmptyAttachment,
            Self::Attachment(SizeError::TooLarge { .. }) => RejectionKind::SizeViolation,
            Self::InvalidAttachment(_) => RejectionKind::InvalidAttachment,
            Self::Protected { .. } => RejectionKind::ProtectionDenied,
            Self::Lease(_) => RejectionKind::LeaseContention,
            Self::AlreadyExists => RejectionKind::AlreadyExists,
            Self::MetadataTooLarge(_) => RejectionKind::SizeViolation,
            Self::Store(StoreError::ConstraintViolation { .. }) => RejectionKind::ConstraintViolation,
            Self::Store(_) => RejectionKind::Storage,
        }
    }

    fn data(&self) -> Option<Value> {
        match self {
            Self::Attachment(SizeError::TooLarge { size, max }) => Some(json!({ "size": size, "max_size": max })),
            Self::Protected { rules } => serde_json::to_value(rules).ok().map(|rules| json!({ "rules": rules })),
            Self::MetadataTooLarge(violation) => Some(json!({
                "size": violation.size,
                "max_size": violation.max_size,
                "field_sizes": violation.field_sizes_map(),
            })),
            _ => None,
        }
    }
}

impl From<PublishError> for PublishResult {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::AlreadyExists => PublishResult::Conflicted {
                message: err.to_string(),
            },
            err => {
                let kind = err.kind();
                let message = err.to_string();
                let rejection = match err.data() {
                    Some(data) => Rejection::with_data(kind, message, data),
                    None => Rejection::new(kind, message),
                };
                PublishResult::Rejected { rejection }
            }
        }
    }
}

/// Publishes npm packages exactly once per project, name and version.
pub struct PublishService {
    settings: PublishSettings,
    store: Arc<dyn ArtifactStore>,
    leases: LeaseCoordinator,
    reporter: Arc<dyn ErrorReporter>,
    protection: ProtectionEngine,
    sanitizer: MetadataSanitizer,
}

impl PublishService {
    pub fn new(
        settings: PublishSettings,
        store: Arc<dyn ArtifactStore>,
        lease_backend: Arc<dyn LeaseBackend>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            protection: ProtectionEngine::new(settings.protected_packages_enabled),
            sanitizer: MetadataSanitizer::new(&settings.metadata),
            leases: LeaseCoordinator::new(lease_backend),
            settings,
            store,
            reporter,
        }
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Decode an npm publish document and publish it.
    pub fn publish_payload(
        &self,
        project: &Project,
        actor: &Actor,
        bytes: &[u8],
        build: Option<BuildInfo>,
    ) -> PublishResult {
        match PublishRequest::from_npm_payload(bytes) {
            Ok(mut request) => {
                request.build = build;
                self.publish(project, actor, request)
            }
            Err(e) => {
                debug!(project_id = project.id, error = %e, "publish document rejected");
                PublishError::from(e).into()
            }
        }
    }

    /// Publish one package version.
    pub fn publish(&self, project: &Project, actor: &Actor, request: PublishRequest) -> PublishResult {
        let name = request.name.clone();
        let version = request.version.clone();

        match self.try_publish(project, actor, request) {
            Ok(artifact) => {
                info!(
                    project_id = project.id,
                    package = %name,
                    version = %version,
                    artifact_id = artifact.id,
                    "package published"
                );
                PublishResult::Committed { artifact }
            }
            Err(e) => {
                match e.kind() {
                    RejectionKind::LeaseContention
                    | RejectionKind::ConstraintViolation
                    | RejectionKind::Storage => {
                        warn!(project_id = project.id, package = %name, version = %version, error = %e, "publish failed")
                    }
                    kind => {
                        debug!(project_id = project.id, package = %name, version = %version, %kind, "publish rejected")
                    }
                }
                e.into()
            }
        }
    }

    fn try_publish(&self, project: &Project, actor: &Actor, request: PublishRequest) -> Result<Artifact, PublishError> {
        self.check_request(&request)?;
        self.authorize(project, actor, &request.name)?;

        let key = lease_key(project.id, &request.name, &request.version);
        self.leases
            .with_lease(&key, self.settings.lease_timeout(), || self.write(project, actor, request))
            .map_err(PublishError::Lease)?
    }

    fn check_request(&self, request: &PublishRequest) -> Result<(), PublishError> {
        if request.version.is_empty() {
            return Err(PublishError::EmptyVersion);
        }
        validate(&request.name, &request.version)?;
        check_attachment_size(
            request.attachment.encoded_len(),
            request.attachment.padding(),
            self.settings.max_file_size,
        )?;
        Ok(())
    }

    fn authorize(&self, project: &Project, actor: &Actor, name: &str) -> Result<(), PublishError> {
        match self
            .protection
            .authorize(&project.protection_rules, PackageType::Npm, name, actor.access_level)
        {
            Authorization::Allowed => Ok(()),
            Authorization::Denied { rules } => Err(PublishError::Protected { rules }),
        }
    }

    fn write(&self, project: &Project, actor: &Actor, request: PublishRequest) -> Result<Artifact, PublishError> {
        let PublishRequest {
            name,
            version,
            metadata,
            dist_tag,
            attachment,
            build,
        } = request;

        if self.store.exists_active(project.id, PackageType::Npm, &name, &version)? {
            return Err(PublishError::AlreadyExists);
        }

        let metadata = self.sanitizer.sanitize(metadata).map_err(|violation| {
            self.report_oversized_metadata(project, &name, &version, &violation);
            violation
        })?;

        let data = STANDARD.decode(attachment.data.as_bytes())?;
        let shasum = metadata
            .get("dist")
            .and_then(|dist| dist.get("shasum"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let package_file = PackageFile {
            file_name: format!("{}-{}.tgz", name, version),
            size: data.len() as u64,
            sha256: hex::encode(Sha256::digest(&data)),
            shasum,
            data,
        };

        let write = PublishWrite {
            artifact: NewArtifact {
                project_id: project.id,
                name,
                version,
                package_type: PackageType::Npm,
                creator_id: actor.id,
            },
            tag: VersionTag { name: dist_tag },
            metadata,
            package_file,
            build_info: build,
        };

        Ok(self.store.create_all(write)?)
    }

    fn report_oversized_metadata(&self, project: &Project, name: &str, version: &str, violation: &SizeViolation) {
        let mut context = Map::new();
        context.insert("field_sizes".to_string(), Value::Object(violation.field_sizes_map()));
        context.insert("project_id".to_string(), json!(project.id));
        context.insert("package_name".to_string(), json!(name));
        context.insert("version".to_string(), json!(version));
        self.reporter.report(violation, &context);
    }
}
