//! # Queues
//!
//! A queue is a bounded FIFO with competing consumers. Consumers take turns
//! on the receiving end; the whole wait, including the turn, is bounded by
//! the caller's timeout.

use crate::broker::ConnectionId;
use crate::error::BrokerError;
use crate::message::Message;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

/// Outcome of waiting on a queue.
#[derive(Debug)]
pub enum Take {
    /// A message arrived.
    Message(Message),
    /// The timeout elapsed.
    TimedOut,
    /// The queue was deleted while waiting.
    Deleted,
}

/// A single queue.
pub struct Queue {
    name: String,
    /// Owning connection for temporary queues.
    owner: Option<ConnectionId>,
    sender: mpsc::Sender<Message>,
    receiver: Mutex<mpsc::Receiver<Message>>,
    deleted_tx: watch::Sender<bool>,
}

impl Queue {
    /// Create a queue holding at most `capacity` messages.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: Option<ConnectionId>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (deleted_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            owner,
            sender,
            receiver: Mutex::new(receiver),
            deleted_tx,
        }
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning connection, for temporary queues.
    #[must_use]
    pub fn owner(&self) -> Option<ConnectionId> {
        self.owner
    }

    /// Number of buffered messages.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Whether the queue has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        *self.deleted_tx.borrow()
    }

    /// Enqueue without waiting.
    pub fn offer(&self, message: Message) -> Result<(), BrokerError> {
        if self.is_deleted() {
            return Err(BrokerError::UnknownDestination(self.name.clone()));
        }
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BrokerError::QueueFull(self.name.clone()),
            mpsc::error::TrySendError::Closed(_) => {
                BrokerError::UnknownDestination(self.name.clone())
            }
        })
    }

    /// Wait up to `timeout` for the next message.
    pub async fn take(&self, timeout: Duration) -> Take {
        if self.is_deleted() {
            return Take::Deleted;
        }
        let mut deleted = self.deleted_tx.subscribe();

        let wait = async {
            let mut receiver = self.receiver.lock().await;
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(message) => Take::Message(message),
                    None => Take::Deleted,
                },
                _ = deleted.wait_for(|d| *d) => Take::Deleted,
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(take) => take,
            Err(_) => Take::TimedOut,
        }
    }

    /// Mark the queue deleted, waking every waiting consumer.
    pub fn delete(&self) {
        self.deleted_tx.send_replace(true);
        debug!(queue = %self.name, "Queue deleted");
    }
}
