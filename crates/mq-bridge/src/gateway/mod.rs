//! Send-and-await-reply orchestration.
//!
//! ```text
//! Idle ──send──► Sending ──ok──► AwaitingReply ──┬─ text reply ──► Delivered
//!                   │                            ├─ other reply ─► NonTextReply
//!                   │                            ├─ timeout ─────► Empty
//!                   └──────── error ─────────────┴─ error ───────► BrokerError
//! ```
//!
//! In correlated mode each request carries a fresh [`CorrelationId`] and a
//! single [`ReplyListener`] per reply channel completes the waiting request
//! through the [`PendingReplyStore`]. In shared-channel mode the request does
//! one bounded receive on the channel itself.

pub mod listener;

pub use listener::{ReplyListener, LISTENER_POLL_INTERVAL};

use crate::adapters::PendingReplyStore;
use crate::domain::{CorrelationId, ReplyChannel, ReplyMatching, ReplyOutcome};
use crate::ports::{ConnectionHandle, InboundBody, InboundMessage, OutboundMessage};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct BridgeGateway {
    matching: ReplyMatching,
    pending: Arc<PendingReplyStore>,
    listeners: DashMap<ReplyChannel, JoinHandle<()>>,
    listener_poll: Duration,
}

impl BridgeGateway {
    pub fn new(matching: ReplyMatching) -> Self {
        Self::with_store(matching, Arc::new(PendingReplyStore::new()))
    }

    pub fn with_store(matching: ReplyMatching, pending: Arc<PendingReplyStore>) -> Self {
        Self {
            matching,
            pending,
            listeners: DashMap::new(),
            listener_poll: LISTENER_POLL_INTERVAL,
        }
    }

    /// Override how often reply listeners re-check their session.
    pub fn with_listener_poll(mut self, poll: Duration) -> Self {
        self.listener_poll = poll;
        self
    }

    pub fn matching(&self) -> ReplyMatching {
        self.matching
    }

    pub fn pending(&self) -> &Arc<PendingReplyStore> {
        &self.pending
    }

    /// Number of listener tasks still running.
    pub fn active_listeners(&self) -> usize {
        self.listeners.iter().filter(|l| !l.value().is_finished()).count()
    }

    /// Number of tracked listeners, finished ones included.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Send `payload` to `destination` and wait up to `timeout` for the reply
    /// on `reply_channel`. Never retries.
    pub async fn send_and_await_reply(
        &self,
        destination: &str,
        payload: &str,
        handle: &ConnectionHandle,
        reply_channel: &ReplyChannel,
        timeout: Duration,
    ) -> ReplyOutcome {
        match self.matching {
            ReplyMatching::CorrelationId => {
                self.correlated(destination, payload, handle, reply_channel, timeout)
                    .await
            }
            ReplyMatching::SharedChannel => {
                self.shared(destination, payload, handle, reply_channel, timeout)
                    .await
            }
        }
    }

    async fn correlated(
        &self,
        destination: &str,
        payload: &str,
        handle: &ConnectionHandle,
        reply_channel: &ReplyChannel,
        timeout: Duration,
    ) -> ReplyOutcome {
        self.ensure_listener(handle, reply_channel);

        let (correlation_id, rx) = self.pending.register(destination, reply_channel, timeout);
        let message = OutboundMessage {
            text: payload.to_string(),
            reply_to: reply_channel.clone(),
            correlation_id: Some(correlation_id),
        };

        if let Err(outcome) = self.send(destination, handle, message, Some(correlation_id)).await {
            self.pending.cancel(&correlation_id);
            return outcome;
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => outcome_of(reply),
            Ok(Err(_)) => {
                warn!(
                    correlation_id = %correlation_id,
                    destination = destination,
                    "Reply listener stopped while waiting"
                );
                ReplyOutcome::BrokerError("reply channel closed".into())
            }
            Err(_) => {
                self.pending.cancel(&correlation_id);
                warn!(
                    correlation_id = %correlation_id,
                    destination = destination,
                    timeout_ms = timeout.as_millis() as u64,
                    "No reply within timeout"
                );
                ReplyOutcome::Empty
            }
        }
    }

    async fn shared(
        &self,
        destination: &str,
        payload: &str,
        handle: &ConnectionHandle,
        reply_channel: &ReplyChannel,
        timeout: Duration,
    ) -> ReplyOutcome {
        let message = OutboundMessage {
            text: payload.to_string(),
            reply_to: reply_channel.clone(),
            correlation_id: None,
        };
        if let Err(outcome) = self.send(destination, handle, message, None).await {
            return outcome;
        }

        match handle.session().receive(reply_channel, timeout).await {
            Ok(Some(reply)) => outcome_of(reply),
            Ok(None) => {
                warn!(
                    destination = destination,
                    channel = %reply_channel,
                    timeout_ms = timeout.as_millis() as u64,
                    "No reply within timeout"
                );
                ReplyOutcome::Empty
            }
            Err(e) => {
                warn!(destination = destination, error = %e, "Reply receive failed");
                ReplyOutcome::BrokerError(e.to_string())
            }
        }
    }

    async fn send(
        &self,
        destination: &str,
        handle: &ConnectionHandle,
        message: OutboundMessage,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), ReplyOutcome> {
        let reply_to = message.reply_to.clone();
        match handle.session().send(destination, message).await {
            Ok(()) => {
                debug!(
                    destination = destination,
                    reply_to = %reply_to,
                    correlation_id = ?correlation_id.map(|id| id.to_string()),
                    "Request sent"
                );
                Ok(())
            }
            Err(e) => {
                warn!(destination = destination, error = %e, "Request send failed");
                Err(ReplyOutcome::BrokerError(e.to_string()))
            }
        }
    }

    /// Start the listener for `channel` unless one is running.
    fn ensure_listener(&self, handle: &ConnectionHandle, channel: &ReplyChannel) {
        let spawn = || {
            let listener =
                ReplyListener::new(handle.session().clone(), channel.clone(), self.pending.clone())
                    .with_poll_interval(self.listener_poll);
            tokio::spawn(listener.run())
        };

        // A new channel usually means an old one went away with its session
        if !self.listeners.contains_key(channel) {
            self.prune_listeners();
        }

        match self.listeners.entry(channel.clone()) {
            Entry::Occupied(mut running) => {
                if running.get().is_finished() {
                    debug!(channel = %channel, "Restarting reply listener");
                    running.insert(spawn());
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(spawn());
            }
        }
    }

    /// Stop listeners whose task has ended and forget them.
    pub fn prune_listeners(&self) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|_, task| !task.is_finished());
        before.saturating_sub(self.listeners.len())
    }

    /// Abort every listener.
    pub fn shutdown(&self) {
        for listener in self.listeners.iter() {
            listener.value().abort();
        }
        self.listeners.clear();
    }
}

impl Drop for BridgeGateway {
    fn drop(&mut self) {
        for listener in self.listeners.iter() {
            listener.value().abort();
        }
    }
}

/// Background task forgetting listeners whose channel is gone
pub async fn cleanup_task(gateway: Arc<BridgeGateway>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let pruned = gateway.prune_listeners();
        if pruned > 0 {
            debug!(pruned = pruned, "Forgot finished reply listeners");
        }
    }
}

fn outcome_of(reply: InboundMessage) -> ReplyOutcome {
    match reply.body {
        InboundBody::Text(text) => ReplyOutcome::Delivered(text),
        InboundBody::Other => ReplyOutcome::NonTextReply,
    }
}
