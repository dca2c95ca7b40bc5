//! Error tracking.
//!
//! Only a handful of publish failures are worth tracking, and only with
//! context attached. Reporting goes through [`ErrorReporter`] so the service
//! stays independent of the tracking backend.

use std::error::Error;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

/// Sink for tracked errors.
pub trait ErrorReporter: Send + Sync {
    /// Track `error` together with structured `context`.
    fn report(&self, error: &(dyn Error + 'static), context: &Map<String, Value>);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &(dyn Error + 'static), context: &Map<String, Value>) {
        let context = Value::Object(context.clone());
        tracing::error!(error = %error, context = %context, "tracked publish error");
    }
}

/// A tracked error as seen by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedError {
    pub message: String,
    pub context: Map<String, Value>,
}

/// Keeps every report in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<TrackedError>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far, oldest first.
    pub fn reports(&self) -> Vec<TrackedError> {
        self.reports.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().unwrap_or_else(|p| p.into_inner()).is_empty()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &(dyn Error + 'static), context: &Map<String, Value>) {
        self.reports
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(TrackedError {
                message: error.to_string(),
                context: context.clone(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_recording_reporter_keeps_context() {
        let reporter = RecordingReporter::new();
        assert!(reporter.is_empty());

        let mut context = Map::new();
        context.insert("project_id".to_string(), json!(1));
        reporter.report(&Boom, &context);

        let reports = reporter.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].message, "boom");
        assert_eq!(reports[0].context["project_id"], json!(1));
    }

    #[test]
    fn test_clones_share_reports() {
        let reporter = RecordingReporter::new();
        let clone = reporter.clone();
        clone.report(&Boom, &Map::new());
        assert_eq!(reporter.reports().len(), 1);
    }

    #[test]
    fn test_tracing_reporter_logs_context() {
        let mut context = Map::new();
        context.insert("field_sizes".to_string(), json!({ "description": 6000 }));
        context.insert("package_name".to_string(), json!("@scope/pkg"));

        TracingReporter.report(&Boom, &context);
        TracingReporter.report(&Boom, &Map::new());
    }
}
