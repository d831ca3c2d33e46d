//! Pending reply store: hands replies from a channel listener to the request
//! waiting for them.

use crate::domain::{CorrelationId, ReplyChannel};
use crate::ports::InboundMessage;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long past its own timeout a waiter that is still listening is kept.
///
/// The waiter's timer starts after the send returns, later than
/// `created_at`, so reaping at exactly `timeout` could beat it.
pub const EXPIRY_GRACE: Duration = Duration::from_secs(5);

/// A request waiting for its reply
struct PendingReply {
    /// Channel to hand the reply over
    sender: oneshot::Sender<InboundMessage>,
    /// When the request was registered
    created_at: Instant,
    /// Destination (for logging)
    destination: String,
    /// Reply channel the listener reads
    channel: ReplyChannel,
    /// Timeout for this request
    timeout: Duration,
}

/// Statistics for the pending reply store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total replies handed over
    pub total_completed: AtomicU64,
    /// Total entries reaped after their timeout
    pub total_timeouts: AtomicU64,
    /// Total requests cancelled (timed out in the waiter or dropped)
    pub total_cancelled: AtomicU64,
    /// Replies with no matching waiter
    pub total_unmatched: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingSnapshot {
    pub pending: usize,
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub unmatched: u64,
}

/// Pending reply store for correlated request/reply.
///
/// Flow:
/// 1. Gateway generates a CorrelationId via `register()` and gets a receiver
/// 2. Gateway sends the request carrying the CorrelationId
/// 3. The channel listener receives the reply and calls `complete()`
/// 4. Gateway awaits the receiver or times out and calls `cancel()`
pub struct PendingReplyStore {
    /// Map of correlation ID to waiting request
    pending: DashMap<CorrelationId, PendingReply>,
    /// Statistics
    stats: Arc<PendingStats>,
}

impl PendingReplyStore {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a waiting request and get a receiver for its reply.
    pub fn register(
        &self,
        destination: &str,
        channel: &ReplyChannel,
        timeout: Duration,
    ) -> (CorrelationId, oneshot::Receiver<InboundMessage>) {
        let correlation_id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();

        let request = PendingReply {
            sender: tx,
            created_at: Instant::now(),
            destination: destination.to_string(),
            channel: channel.clone(),
            timeout,
        };

        self.pending.insert(correlation_id, request);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            destination = destination,
            "Registered pending reply"
        );

        (correlation_id, rx)
    }

    /// Hand a reply to its waiter.
    ///
    /// Returns false if no waiter is registered or it has gone away.
    pub fn complete(&self, correlation_id: CorrelationId, reply: InboundMessage) -> bool {
        if let Some((_, pending)) = self.pending.remove(&correlation_id) {
            let response_time = pending.created_at.elapsed();

            match pending.sender.send(reply) {
                Ok(()) => {
                    self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        correlation_id = %correlation_id,
                        destination = pending.destination,
                        response_time_ms = response_time.as_millis(),
                        "Completed pending reply"
                    );
                    true
                }
                Err(_) => {
                    // Receiver was dropped (client went away)
                    self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        correlation_id = %correlation_id,
                        destination = pending.destination,
                        "Pending reply receiver dropped"
                    );
                    false
                }
            }
        } else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                "Reply for unknown or expired correlation ID"
            );
            false
        }
    }

    /// Count a reply that carried no usable correlation id.
    pub fn record_unmatched(&self) {
        self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a waiter. Its receiver sees a closed channel.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drop every waiter on `channel`, e.g. after its listener stopped.
    ///
    /// Returns the number of waiters released.
    pub fn fail_channel(&self, channel: &ReplyChannel) -> usize {
        let mut released = 0;
        self.pending.retain(|_, request| {
            if &request.channel == channel {
                released += 1;
                false
            } else {
                true
            }
        });
        if released > 0 {
            self.stats
                .total_cancelled
                .fetch_add(released as u64, Ordering::Relaxed);
            debug!(channel = %channel, released, "Released waiters of failed channel");
        }
        released
    }

    /// Remove waiters nobody listens to any more, plus live ones that
    /// outlived their timeout by [`EXPIRY_GRACE`].
    ///
    /// Returns the number of entries removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, request| {
            let elapsed = now.duration_since(request.created_at);
            let abandoned = request.sender.is_closed();
            if abandoned || elapsed > request.timeout + EXPIRY_GRACE {
                warn!(
                    correlation_id = %id,
                    destination = request.destination,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = request.timeout.as_millis(),
                    abandoned,
                    "Removing expired pending reply"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Get number of currently pending replies
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            pending: self.pending_count(),
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            completed: self.stats.total_completed.load(Ordering::Relaxed),
            timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.stats.total_cancelled.load(Ordering::Relaxed),
            unmatched: self.stats.total_unmatched.load(Ordering::Relaxed),
        }
    }

    /// Check if a correlation ID is pending
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }
}

impl Default for PendingReplyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task to reap expired waiters
pub async fn cleanup_task(store: Arc<PendingReplyStore>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending replies");
        }
    }
}
