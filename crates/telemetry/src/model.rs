//! Data model for request spans and usage summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single tracked chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpan {
    /// Unique identifier.
    pub id: String,
    /// Session the request belonged to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// End-to-end latency in milliseconds.
    pub elapsed_ms: u64,
    /// Token/word count reported by the engine.
    pub tokens: u64,
    /// Outcome label (`success`, `error`, …).
    pub status: String,
    /// When the request finished.
    pub finished_at: DateTime<Utc>,
}

impl RequestSpan {
    pub fn new(elapsed_ms: u64, tokens: u64, status: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: None,
            elapsed_ms,
            tokens,
            status: status.into(),
            finished_at: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Aggregated view over everything recorded since startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Total requests observed.
    pub total_requests: u64,
    /// Requests whose status was `success`.
    pub successful_requests: u64,
    /// Requests with any other status.
    pub failed_requests: u64,
    /// Total tokens/words across all requests.
    pub total_tokens: u64,
    /// Mean latency over all requests, in milliseconds.
    pub avg_latency_ms: f64,
    /// When the engine started tracking.
    pub since: DateTime<Utc>,
}
