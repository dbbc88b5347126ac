//! Thread-safe telemetry engine — collects request spans and serves
//! usage reports.

use crate::model::{RequestSpan, UsageSnapshot};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Maximum number of spans kept in the recent ring.
const MAX_RECENT_SPANS: usize = 1_000;

/// The core telemetry engine.
///
/// Thread-safe via `RwLock`. Recording never fails; when the ring is
/// full the oldest span is evicted.
pub struct TelemetryEngine {
    /// Recent spans, oldest first.
    spans: RwLock<VecDeque<RequestSpan>>,
    /// Running totals.
    totals: RwLock<RunningTotals>,
    /// When tracking started.
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RunningTotals {
    total_requests: u64,
    successful_requests: u64,
    total_tokens: u64,
    total_latency_ms: u64,
}

impl TelemetryEngine {
    pub fn new() -> Self {
        Self {
            spans: RwLock::new(VecDeque::new()),
            totals: RwLock::new(RunningTotals::default()),
            started_at: Utc::now(),
        }
    }

    /// Record one finished request.
    pub fn record(&self, span: RequestSpan) {
        {
            let mut totals = self.totals.write().unwrap();
            totals.total_requests += 1;
            if span.status == "success" {
                totals.successful_requests += 1;
            }
            totals.total_tokens += span.tokens;
            totals.total_latency_ms += span.elapsed_ms;
        }

        let mut spans = self.spans.write().unwrap();
        if spans.len() == MAX_RECENT_SPANS {
            spans.pop_front();
        }
        spans.push_back(span);
    }

    /// The most recent spans, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RequestSpan> {
        let spans = self.spans.read().unwrap();
        spans.iter().rev().take(limit).cloned().collect()
    }

    /// Aggregate usage since startup.
    pub fn snapshot(&self) -> UsageSnapshot {
        let totals = self.totals.read().unwrap();
        let avg_latency_ms = if totals.total_requests == 0 {
            0.0
        } else {
            totals.total_latency_ms as f64 / totals.total_requests as f64
        };
        UsageSnapshot {
            total_requests: totals.total_requests,
            successful_requests: totals.successful_requests,
            failed_requests: totals.total_requests - totals.successful_requests,
            total_tokens: totals.total_tokens,
            avg_latency_ms,
            since: self.started_at,
        }
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let engine = TelemetryEngine::new();
        let snap = engine.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.avg_latency_ms, 0.0);
    }

    #[test]
    fn snapshot_arithmetic() {
        let engine = TelemetryEngine::new();
        engine.record(RequestSpan::new(100, 10, "success"));
        engine.record(RequestSpan::new(300, 20, "error"));

        let snap = engine.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.successful_requests, 1);
        assert_eq!(snap.failed_requests, 1);
        assert_eq!(snap.total_tokens, 30);
        assert_eq!(snap.avg_latency_ms, 200.0);
    }

    #[test]
    fn recent_returns_newest_first() {
        let engine = TelemetryEngine::new();
        for i in 0..5 {
            engine.record(RequestSpan::new(i, 1, "success"));
        }
        let recent = engine.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].elapsed_ms, 4);
        assert_eq!(recent[1].elapsed_ms, 3);
    }

    #[test]
    fn ring_evicts_oldest() {
        let engine = TelemetryEngine::new();
        for i in 0..(MAX_RECENT_SPANS as u64 + 10) {
            engine.record(RequestSpan::new(i, 0, "success"));
        }
        let spans = engine.spans.read().unwrap();
        assert_eq!(spans.len(), MAX_RECENT_SPANS);
        assert_eq!(spans.front().unwrap().elapsed_ms, 10);
    }
}
