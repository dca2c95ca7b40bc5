//! Rejection taxonomy for publish outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rejection kinds returned to the transport layer.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    /// The publish document could not be decoded.
    InvalidPayload,
    /// Package name or version failed format validation.
    InvalidIdentity,
    /// The document carried no version entry.
    EmptyVersion,
    /// The attachment carried no data.
    EmptyAttachment,
    /// The attachment data is not valid base64.
    InvalidAttachment,
    /// Attachment or metadata exceeds its configured bound.
    SizeViolation,
    /// A protection rule denies the actor.
    ProtectionDenied,
    /// Another attempt holds the lease for this package version.
    LeaseContention,
    /// An active package with this name and version already exists.
    AlreadyExists,
    /// Storage refused the write on its uniqueness constraint.
    ConstraintViolation,
    /// Storage failed for a reason unrelated to the publish input.
    Storage,
}

impl RejectionKind {
    /// HTTP status the transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AlreadyExists | Self::ProtectionDenied => 403,
            Self::Storage => 500,
            _ => 400,
        }
    }

    /// Whether resubmitting the same request may succeed.
    ///
    /// Only contention and residual constraint races are transient; every
    /// other rejection is a property of the request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LeaseContention | Self::ConstraintViolation)
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload => write!(f, "INVALID_PAYLOAD"),
            Self::InvalidIdentity => write!(f, "INVALID_IDENTITY"),
            Self::EmptyVersion => write!(f, "EMPTY_VERSION"),
            Self::EmptyAttachment => write!(f, "EMPTY_ATTACHMENT"),
            Self::InvalidAttachment => write!(f, "INVALID_ATTACHMENT"),
            Self::SizeViolation => write!(f, "SIZE_VIOLATION"),
            Self::ProtectionDenied => write!(f, "PROTECTION_DENIED"),
            Self::LeaseContention => write!(f, "LEASE_CONTENTION"),
            Self::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            Self::ConstraintViolation => write!(f, "CONSTRAINT_VIOLATION"),
            Self::Storage => write!(f, "STORAGE"),
        }
    }
}

/// A rejected publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Rejection kind from the registry.
    pub kind: RejectionKind,
    /// Human-readable, single-line reason.
    pub message: String,
    /// Optional machine-readable details (sizes, denying rules).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Rejection {
    /// Create a new rejection.
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new rejection with additional data.
    pub fn with_data(kind: RejectionKind, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            message: message.into(),
            data: Some(data),
        }
    }

    /// HTTP status for this rejection.
    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Rejection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&RejectionKind::LeaseContention).unwrap();
        assert_eq!(json, "\"LEASE_CONTENTION\"");
        assert_eq!(RejectionKind::LeaseContention.to_string(), "LEASE_CONTENTION");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(RejectionKind::AlreadyExists.http_status(), 403);
        assert_eq!(RejectionKind::ProtectionDenied.http_status(), 403);
        assert_eq!(RejectionKind::SizeViolation.http_status(), 400);
        assert_eq!(RejectionKind::LeaseContention.http_status(), 400);
        assert_eq!(RejectionKind::EmptyAttachment.http_status(), 400);
    }

    #[test]
    fn test_only_transient_kinds_are_retryable() {
        assert!(RejectionKind::LeaseContention.is_retryable());
        assert!(RejectionKind::ConstraintViolation.is_retryable());
        assert!(!RejectionKind::InvalidIdentity.is_retryable());
        assert!(!RejectionKind::SizeViolation.is_retryable());
        assert!(!RejectionKind::ProtectionDenied.is_retryable());
        assert!(!RejectionKind::AlreadyExists.is_retryable());
    }

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection::new(RejectionKind::ProtectionDenied, "Package protected.");
        assert_eq!(rejection.to_string(), "PROTECTION_DENIED: Package protected.");
        assert!(rejection.data.is_none());
    }
}
