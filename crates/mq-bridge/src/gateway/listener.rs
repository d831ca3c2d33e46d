//! Reply listener: one task per reply channel, routing replies to waiters by
//! correlation id.

use crate::adapters::PendingReplyStore;
use crate::domain::ReplyChannel;
use crate::ports::{BrokerSession, InboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long one receive waits before the loop checks the session again.
pub const LISTENER_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ReplyListener {
    session: Arc<dyn BrokerSession>,
    channel: ReplyChannel,
    pending: Arc<PendingReplyStore>,
    poll_interval: Duration,
}

impl ReplyListener {
    pub fn new(
        session: Arc<dyn BrokerSession>,
        channel: ReplyChannel,
        pending: Arc<PendingReplyStore>,
    ) -> Self {
        Self {
            session,
            channel,
            pending,
            poll_interval: LISTENER_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until the session closes or the channel fails.
    ///
    /// Waiters still registered on the channel are released on exit.
    pub async fn run(self) {
        debug!(channel = %self.channel, "Reply listener started");
        loop {
            match self.session.receive(&self.channel, self.poll_interval).await {
                Ok(Some(reply)) => self.dispatch(reply),
                Ok(None) => {
                    if !self.session.is_open() {
                        info!(channel = %self.channel, "Session closed, reply listener stopping");
                        break;
                    }
                }
                Err(e) if e.is_session_lost() => {
                    info!(channel = %self.channel, "Session closed, reply listener stopping");
                    break;
                }
                Err(e) => {
                    error!(channel = %self.channel, error = %e, "Reply channel receive failed");
                    break;
                }
            }
        }

        let released = self.pending.fail_channel(&self.channel);
        if released > 0 {
            warn!(
                channel = %self.channel,
                released = released,
                "Released waiters of stopped reply listener"
            );
        }
    }

    fn dispatch(&self, reply: InboundMessage) {
        match reply.parsed_correlation_id() {
            Some(correlation_id) => {
                // Unknown ids are logged by the store.
                self.pending.complete(correlation_id, reply);
            }
            None => {
                self.pending.record_unmatched();
                warn!(
                    channel = %self.channel,
                    correlation_id = ?reply.correlation_id,
                    "Discarding reply without a usable correlation ID"
                );
            }
        }
    }
}
