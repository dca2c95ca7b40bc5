//! Shared fixtures for the publish integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use npm_publish::{
    AccessLevel, Actor, MemoryLeaseBackend, MemoryStore, Project, PublishRequest, PublishService, PublishSettings,
    RecordingReporter,
};
use serde_json::{json, Map, Value};

/// Base64 of `hello world\n`.
pub const TARBALL_BASE64: &str = "aGVsbG8gd29ybGQK";

/// SHA-256 of `hello world\n`.
pub const TARBALL_SHA256: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

pub const PROJECT_ID: u64 = 1;

/// Path to the recorded `npm publish` document.
pub fn payload_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/payload.json")
}

/// Raw bytes of the recorded `npm publish` document.
pub fn payload_bytes() -> Vec<u8> {
    std::fs::read(payload_path()).expect("Failed to read payload fixture")
}

/// A publish document for `name@version` carrying the fixture tarball.
pub fn publish_document(name: &str, version: &str) -> Value {
    publish_document_with_data(name, version, TARBALL_BASE64)
}

/// A publish document whose attachment carries `data`.
pub fn publish_document_with_data(name: &str, version: &str, data: &str) -> Value {
    let mut versions = Map::new();
    versions.insert(
        version.to_string(),
        json!({
            "name": name,
            "version": version,
            "readme": "# readme",
            "contributors": [{ "name": "someone" }],
            "dist": { "shasum": "22596363b3de40b06f981fb85d82312e8c0ed511" }
        }),
    );

    let mut dist_tags = Map::new();
    dist_tags.insert("latest".to_string(), json!(version));

    let mut attachments = Map::new();
    attachments.insert(
        format!("{}-{}.tgz", name, version),
        json!({ "content_type": "application/octet-stream", "data": data, "length": 12 }),
    );

    json!({
        "name": name,
        "versions": versions,
        "dist-tags": dist_tags,
        "_attachments": attachments,
    })
}

/// A request for `name@version` carrying the fixture tarball.
pub fn request(name: &str, version: &str) -> PublishRequest {
    request_from(publish_document(name, version))
}

/// Decode a publish document into a request.
pub fn request_from(document: Value) -> PublishRequest {
    let bytes = serde_json::to_vec(&document).expect("Failed to encode document");
    PublishRequest::from_npm_payload(&bytes).expect("Failed to decode document")
}

pub fn project() -> Project {
    Project::new(PROJECT_ID)
}

pub fn developer() -> Actor {
    Actor::new(Some(7), AccessLevel::Developer)
}

/// A service over in-memory collaborators, plus handles to inspect them.
pub struct Harness {
    pub service: Arc<PublishService>,
    pub store: MemoryStore,
    pub leases: MemoryLeaseBackend,
    pub reporter: RecordingReporter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(PublishSettings::default())
    }

    pub fn with_settings(settings: PublishSettings) -> Self {
        let store = MemoryStore::new();
        let leases = MemoryLeaseBackend::new();
        let reporter = RecordingReporter::new();
        let service = PublishService::new(
            settings,
            Arc::new(store.clone()),
            Arc::new(leases.clone()),
            Arc::new(reporter.clone()),
        );
        Self {
            service: Arc::new(service),
            store,
            leases,
            reporter,
        }
    }
}
