//! Publish outcome.

use serde::{Deserialize, Serialize};

use crate::error::{Rejection, RejectionKind};
use crate::records::Artifact;

/// Terminal outcome of one publish attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishResult {
    /// All records were written.
    Committed { artifact: Artifact },
    /// The request was refused; nothing was written.
    Rejected { rejection: Rejection },
    /// An active artifact with the same key already exists; nothing was written.
    Conflicted { message: String },
}

impl PublishResult {
    /// Check if the publish wrote its records.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// The committed artifact, if any.
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Committed { artifact } => Some(artifact),
            _ => None,
        }
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected { rejection } => Some(rejection),
            _ => None,
        }
    }

    /// Rejection kind for non-committed outcomes.
    ///
    /// A conflict reports [`RejectionKind::AlreadyExists`].
    pub fn kind(&self) -> Option<RejectionKind> {
        match self {
            Self::Committed { .. } => None,
            Self::Rejected { rejection } => Some(rejection.kind),
            Self::Conflicted { .. } => Some(RejectionKind::AlreadyExists),
        }
    }

    /// Human-readable message for non-committed outcomes.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Committed { .. } => None,
            Self::Rejected { rejection } => Some(&rejection.message),
            Self::Conflicted { message } => Some(message),
        }
    }

    /// HTTP status the transport layer should answer with.
    pub fn http_status(&self) -> u16 {
        self.kind().map(|k| k.http_status()).unwrap_or(200)
    }
}
