//! Observability records: per-request logs and host metric samples.
//!
//! Both are persisted through the storage collaborator and surfaced by
//! the monitoring routes; neither affects generation correctness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One record per chat request: how long it took, how many tokens or
/// words came out, and how the generation concluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    /// Unique log ID (`log_<uuid>`)
    pub log_id: String,

    /// Session the request belonged to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// The user message that triggered the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// End-to-end processing time in milliseconds
    pub processing_ms: u64,

    /// Token/word count reported by the engine
    pub tokens_used: u64,

    /// `success`, `invalid_input`, `model_unavailable`, or `error`
    pub status: String,

    /// Error detail when status is not `success`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the record was written
    pub timestamp: DateTime<Utc>,
}

impl RequestLog {
    /// Create a record with a fresh `log_` ID stamped now.
    pub fn new(processing_ms: u64, tokens_used: u64, status: impl Into<String>) -> Self {
        Self {
            log_id: format!("log_{}", Uuid::new_v4().simple()),
            session_id: None,
            message_id: None,
            processing_ms,
            tokens_used,
            status: status.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// A point-in-time host/application metric sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    /// Unique metric ID (`metric_<uuid>`)
    pub metric_id: String,

    /// CPU utilization percentage
    pub cpu_usage: f64,

    /// Memory utilization percentage
    pub memory_usage: f64,

    /// Observed request latency in seconds
    pub latency: f64,

    /// Requests observed in the sampling window
    pub user_requests: u64,

    /// Free-form extra dimensions
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub additional_info: serde_json::Map<String, serde_json::Value>,

    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(cpu_usage: f64, memory_usage: f64, latency: f64, user_requests: u64) -> Self {
        Self {
            metric_id: format!("metric_{}", Uuid::new_v4().simple()),
            cpu_usage,
            memory_usage,
            latency,
            user_requests,
            additional_info: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_log_builder() {
        let log = RequestLog::new(120, 45, "success")
            .with_session("sess_1")
            .with_message("msg_1");
        assert!(log.log_id.starts_with("log_"));
        assert_eq!(log.session_id.as_deref(), Some("sess_1"));
        assert_eq!(log.tokens_used, 45);
    }

    #[test]
    fn metric_sample_serializes_without_empty_info() {
        let sample = MetricSample::new(45.2, 68.7, 0.8, 120);
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("metric_"));
        assert!(!json.contains("additional_info"));
    }
}
