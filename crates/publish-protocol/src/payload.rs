//! npm publish document decoding.
//!
//! `npm publish` sends one JSON document per version:
//!
//! ```json
//! {
//!   "name": "@scope/pkg",
//!   "versions": { "1.0.1": { ...package.json... } },
//!   "dist-tags": { "latest": "1.0.1" },
//!   "_attachments": { "@scope/pkg-1.0.1.tgz": { "data": "<base64>", "length": 6 } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::DEFAULT_DIST_TAG;

/// Errors from decoding a publish document.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid publish document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("version '{0}' metadata is not an object")]
    VersionNotObject(String),
}

/// An encoded tarball attached to a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    /// MIME type declared by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 tarball.
    #[serde(default)]
    pub data: String,
    /// Decoded length declared by the client. Untrusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl AttachmentDescriptor {
    /// Create a descriptor from encoded data.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            content_type: None,
            data: data.into(),
            length: None,
        }
    }

    /// Length of the encoded data in bytes.
    pub fn encoded_len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Number of `=` padding characters at the end of the encoded data.
    pub fn padding(&self) -> u8 {
        self.data
            .as_bytes()
            .iter()
            .rev()
            .take(2)
            .filter(|b| **b == b'=')
            .count() as u8
    }

    /// Check if the attachment carries no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    versions: Map<String, Value>,
    #[serde(default, rename = "dist-tags")]
    dist_tags: Map<String, Value>,
    #[serde(default, rename = "_attachments")]
    attachments: BTreeMap<String, AttachmentDescriptor>,
}

/// A decoded publish document.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPayload {
    /// Package name as sent by the client.
    pub name: String,
    /// Version being published; `None` when `versions` is empty.
    pub version: Option<String>,
    /// The version's `package.json`, unsanitized.
    pub metadata: Map<String, Value>,
    /// Dist-tag to point at the new version.
    pub dist_tag: String,
    /// The tarball, if the client attached one.
    pub attachment: Option<AttachmentDescriptor>,
}

impl PublishPayload {
    /// Decode from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawDocument = serde_json::from_slice(bytes)?;
        Self::from_raw(raw)
    }

    /// Decode from a parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let raw: RawDocument = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self, PayloadError> {
        let (version, metadata) = match raw.versions.into_iter().next() {
            Some((version, Value::Object(map))) => (Some(version), map),
            Some((version, _)) => return Err(PayloadError::VersionNotObject(version)),
            None => (None, Map::new()),
        };

        let dist_tag = version
            .as_deref()
            .and_then(|v| {
                raw.dist_tags
                    .iter()
                    .find(|(_, target)| target.as_str() == Some(v))
                    .map(|(tag, _)| tag.clone())
            })
            .unwrap_or_else(|| DEFAULT_DIST_TAG.to_string());

        Ok(Self {
            name: raw.name,
            version,
            metadata,
            dist_tag,
            attachment: raw.attachments.into_values().next(),
        })
    }
}
