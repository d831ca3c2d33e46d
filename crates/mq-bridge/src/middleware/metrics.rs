//! Bridge metrics: atomic counters with a JSON export.

use crate::domain::ReplyStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Bridge metrics
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    // Request counters
    pub requests_total: AtomicU64,

    // Outcome counters
    pub delivered: AtomicU64,
    pub empty: AtomicU64,
    pub non_text: AtomicU64,
    pub broker_errors: AtomicU64,

    // Rejections before reaching the broker
    pub connection_errors: AtomicU64,
    pub auth_challenges: AtomicU64,
    pub invalid_destinations: AtomicU64,

    // Latency tracking (sum and count, no histogram)
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed round trip
    pub fn record_outcome(&self, status: ReplyStatus, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let counter = match status {
            ReplyStatus::Delivered => &self.delivered,
            ReplyStatus::Empty => &self.empty,
            ReplyStatus::NonTextReply => &self.non_text,
            ReplyStatus::BrokerError => &self.broker_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that failed to get a connection or channel
    pub fn record_connection_error(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request answered with an authentication challenge
    pub fn record_auth_challenge(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.auth_challenges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_destination(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.invalid_destinations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average round-trip latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "auth_challenges": self.auth_challenges.load(Ordering::Relaxed),
                "invalid_destinations": self.invalid_destinations.load(Ordering::Relaxed),
                "connection_errors": self.connection_errors.load(Ordering::Relaxed),
            },
            "outcomes": {
                "delivered": self.delivered.load(Ordering::Relaxed),
                "empty": self.empty.load(Ordering::Relaxed),
                "non_text_reply": self.non_text.load(Ordering::Relaxed),
                "broker_error": self.broker_errors.load(Ordering::Relaxed),
            },
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Round-trip timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<BridgeMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self, status: ReplyStatus) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_outcome(status, latency_ms);
    }
}
