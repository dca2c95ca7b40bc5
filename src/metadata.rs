//! `package.json` sanitization.
//!
//! The stored document is whatever the client sent for the version, minus
//! fields the registry manages itself, and bounded in size. When a document
//! is too large the rejection names its largest fields so oversized
//! manifests can be diagnosed without shipping the manifest itself.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use publish_protocol::MetadataDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::MetadataSettings;

/// Size of one top-level field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSize {
    pub field: String,
    pub size: usize,
}

/// A document over the size bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: Package json structure is too large")]
pub struct SizeViolation {
    /// Compact JSON size of the sanitized document.
    pub size: usize,
    /// The configured bound.
    pub max_size: usize,
    /// Largest fields, biggest first.
    pub field_sizes: Vec<FieldSize>,
}

impl SizeViolation {
    /// The field report as a JSON object, field name to size.
    pub fn field_sizes_map(&self) -> Map<String, Value> {
        self.field_sizes
            .iter()
            .map(|f| (f.field.clone(), Value::from(f.size)))
            .collect()
    }
}

/// Strips disallowed fields and enforces the size bound.
#[derive(Debug, Clone)]
pub struct MetadataSanitizer {
    disallowed_fields: BTreeSet<String>,
    max_size: usize,
    report_floor: usize,
    report_limit: usize,
}

impl MetadataSanitizer {
    /// Build a sanitizer from settings.
    pub fn new(settings: &MetadataSettings) -> Self {
        Self {
            disallowed_fields: settings.disallowed_fields.iter().cloned().collect(),
            max_size: settings.max_size,
            report_floor: settings.report_floor,
            report_limit: settings.report_limit,
        }
    }

    /// Produce the document to store, or a size violation.
    pub fn sanitize(&self, raw: Map<String, Value>) -> Result<MetadataDocument, SizeViolation> {
        let document = self.strip(raw);

        let size = compact_len(&document);
        if size > self.max_size {
            return Err(SizeViolation {
                size,
                max_size: self.max_size,
                field_sizes: self.field_report(&document),
            });
        }

        Ok(MetadataDocument::from(document))
    }

    /// Remove disallowed top-level fields.
    pub fn strip(&self, mut raw: Map<String, Value>) -> Map<String, Value> {
        raw.retain(|field, _| !self.disallowed_fields.contains(field));
        raw
    }

    /// Largest fields of `document`, at most `report_limit` of them.
    ///
    /// Only fields above the reporting floor are named; when none is, the
    /// largest fields overall are named instead.
    fn field_report(&self, document: &Map<String, Value>) -> Vec<FieldSize> {
        let all: Vec<FieldSize> = document
            .iter()
            .map(|(field, value)| FieldSize {
                field: field.clone(),
                size: field_size(value),
            })
            .collect();

        let over_floor: Vec<FieldSize> = all.iter().filter(|f| f.size > self.report_floor).cloned().collect();
        let mut report = if over_floor.is_empty() { all } else { over_floor };

        report.sort_by(|a, b| (Reverse(a.size), &a.field).cmp(&(Reverse(b.size), &b.field)));
        report.truncate(self.report_limit);
        report
    }
}

/// Compact JSON length of a document.
fn compact_len(document: &Map<String, Value>) -> usize {
    // A map of JSON values always serializes; treat the impossible as oversized.
    serde_json::to_vec(document).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}

/// Byte length of a string value, or of the compact JSON of anything else.
fn field_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitizer() -> MetadataSanitizer {
        MetadataSanitizer::new(&MetadataSettings::default())
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_strips_disallowed_fields() {
        let raw = object(json!({
            "name": "@scope/pkg",
            "version": "1.0.0",
            "readme": "# big readme",
            "readmeFilename": "README.md",
            "licenseText": "MIT ...",
            "contributors": ["a"],
            "exports": { ".": "./index.js" }
        }));

        let doc = sanitizer().sanitize(raw).unwrap();

        assert_eq!(doc.len(), 2);
        for field in ["readme", "readmeFilename", "licenseText", "contributors", "exports"] {
            assert!(!doc.contains(field), "{} should be stripped", field);
        }
    }

    #[test]
    fn test_disallowed_fields_do_not_count_toward_size() {
        let raw = object(json!({
            "name": "pkg",
            "readme": "r".repeat(50_000)
        }));
        assert!(sanitizer().sanitize(raw).is_ok());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let raw = object(json!({
            "name": "pkg",
            "version": "1.0.0",
            "readme": "text",
            "dependencies": { "left-pad": "^1.0.0" }
        }));
        let s = sanitizer();

        let once = s.sanitize(raw).unwrap();
        let twice = s.sanitize(once.clone().into_map()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_oversized_document_reports_fields_above_floor() {
        let floor = MetadataSettings::default().report_floor;
        let raw = object(json!({
            "name": "pkg",
            "test": "test".repeat(10_000),
            "field1": "a".repeat(floor - 1),
            "field2": "a".repeat(floor + 1)
        }));

        let violation = sanitizer().sanitize(raw).unwrap_err();

        assert_eq!(
            violation.field_sizes,
            vec![
                FieldSize { field: "test".to_string(), size: 40_000 },
                FieldSize { field: "field2".to_string(), size: floor + 1 },
            ]
        );
        assert!(violation.size > violation.max_size);
        assert_eq!(violation.to_string(), "Validation failed: Package json structure is too large");
    }

    #[test]
    fn test_report_falls_back_to_largest_fields_below_floor() {
        let floor = MetadataSettings::default().report_floor;
        let mut raw = object(json!({ "name": "pkg", "version": "1.0.0" }));
        for i in 1..=5 {
            raw.insert(format!("field{}", i), json!("a".repeat(floor - 1)));
        }

        let violation = sanitizer().sanitize(raw).unwrap_err();

        let map = violation.field_sizes_map();
        assert_eq!(map.len(), 5);
        for i in 1..=5 {
            assert_eq!(map[&format!("field{}", i)], json!(floor - 1));
        }
    }

    #[test]
    fn test_report_keeps_five_largest_of_seven() {
        let mut raw = Map::new();
        for (i, size) in [6_000, 9_000, 7_000, 12_000, 8_000, 10_000, 11_000].iter().enumerate() {
            raw.insert(format!("f{}", i), json!("x".repeat(*size)));
        }

        let violation = sanitizer().sanitize(raw).unwrap_err();

        let names: Vec<&str> = violation.field_sizes.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["f3", "f6", "f5", "f1", "f4"]);
        let sizes: Vec<usize> = violation.field_sizes.iter().map(|f| f.size).collect();
        assert_eq!(sizes, vec![12_000, 11_000, 10_000, 9_000, 8_000]);
    }

    #[test]
    fn test_report_ties_broken_by_name() {
        let mut raw = Map::new();
        for name in ["delta", "alpha", "echo", "charlie", "bravo", "foxtrot"] {
            raw.insert(name.to_string(), json!("x".repeat(6_000)));
        }

        let violation = sanitizer().sanitize(raw).unwrap_err();

        let names: Vec<&str> = violation.field_sizes.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
    }

    #[test]
    fn test_non_string_field_sized_as_json() {
        assert_eq!(field_size(&json!("abc")), 3);
        assert_eq!(field_size(&json!({ "a": 1 })), 7);
        assert_eq!(field_size(&json!([1, 2])), 5);
        assert_eq!(field_size(&json!(true)), 4);
    }

    #[test]
    fn test_custom_limits() {
        let settings = MetadataSettings {
            max_size: 10,
            report_floor: 0,
            report_limit: 1,
            disallowed_fields: Vec::new(),
        };
        let violation = MetadataSanitizer::new(&settings)
            .sanitize(object(json!({ "a": "xxxxxxxx", "b": "yy" })))
            .unwrap_err();

        assert_eq!(violation.max_size, 10);
        assert_eq!(violation.field_sizes, vec![FieldSize { field: "a".to_string(), size: 8 }]);
    }
}
