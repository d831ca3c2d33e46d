//! # In-Memory Broker
//!
//! Holds the user registry and every queue. Clients talk to it through a
//! [`Connection`] obtained with [`InMemoryBroker::connect`].

use crate::error::BrokerError;
use crate::message::Message;
use crate::queue::{Queue, Take};
use crate::{DEFAULT_MAX_NAMED_QUEUES, DEFAULT_QUEUE_CAPACITY, TEMP_QUEUE_PREFIX};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifier of a broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Raw numeric id.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID:conn-{}", self.0)
    }
}

/// Broker-wide counters.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Messages accepted by `send`.
    pub messages_sent: AtomicU64,
    /// Messages handed to a consumer.
    pub messages_delivered: AtomicU64,
    /// Successful `connect` calls.
    pub connections_opened: AtomicU64,
    /// Connections closed explicitly or by drop.
    pub connections_closed: AtomicU64,
    /// Rejected `connect` calls.
    pub authentication_failures: AtomicU64,
    /// Temporary queues created.
    pub temporary_queues_created: AtomicU64,
}

struct BrokerInner {
    users: RwLock<HashMap<String, String>>,
    allow_anonymous: AtomicBool,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
    next_connection: AtomicU64,
    stats: BrokerStats,
    capacity: usize,
    /// Only changed under the `queues` write lock
    named_queues: AtomicUsize,
    max_named_queues: AtomicUsize,
}

impl BrokerInner {
    /// Look up a queue, creating named queues on demand.
    fn queue(&self, name: &str) -> Result<Arc<Queue>, BrokerError> {
        if name.trim().is_empty() {
            return Err(BrokerError::InvalidDestination(name.to_string()));
        }
        if let Some(queue) = self.queues.read().get(name) {
            return Ok(Arc::clone(queue));
        }
        if name.starts_with(TEMP_QUEUE_PREFIX) {
            return Err(BrokerError::UnknownDestination(name.to_string()));
        }

        let mut queues = self.queues.write();
        if let Some(queue) = queues.get(name) {
            return Ok(Arc::clone(queue));
        }

        let limit = self.max_named_queues.load(Ordering::Relaxed);
        if self.named_queues.load(Ordering::Relaxed) >= limit {
            warn!(queue = name, limit = limit, "Named queue limit reached");
            return Err(BrokerError::TooManyQueues(limit));
        }

        debug!(queue = name, "Auto-creating queue");
        let queue = Arc::new(Queue::new(name, None, self.capacity));
        queues.insert(name.to_string(), Arc::clone(&queue));
        self.named_queues.fetch_add(1, Ordering::Relaxed);
        Ok(queue)
    }
}

/// Process-local broker.
///
/// Cloning is cheap; clones share the same queues and users.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create a broker with default queue capacity and no users.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a broker whose queues hold at most `capacity` messages.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                users: RwLock::new(HashMap::new()),
                allow_anonymous: AtomicBool::new(false),
                queues: RwLock::new(HashMap::new()),
                next_connection: AtomicU64::new(1),
                stats: BrokerStats::default(),
                capacity,
                named_queues: AtomicUsize::new(0),
                max_named_queues: AtomicUsize::new(DEFAULT_MAX_NAMED_QUEUES),
            }),
        }
    }

    /// Register or replace a user.
    pub fn add_user(&self, identity: impl Into<String>, secret: impl Into<String>) {
        let identity = identity.into();
        info!(user = %identity, "Registered broker user");
        self.inner.users.write().insert(identity, secret.into());
    }

    /// Remove a user. Existing connections stay open.
    pub fn remove_user(&self, identity: &str) -> bool {
        self.inner.users.write().remove(identity).is_some()
    }

    /// Limit the number of named queues created on demand.
    ///
    /// Queues that already exist stay usable when the limit is lowered below
    /// the current count.
    pub fn set_max_named_queues(&self, limit: usize) {
        self.inner.max_named_queues.store(limit, Ordering::Relaxed);
    }

    /// Accept any identity/secret pair when set.
    pub fn set_allow_anonymous(&self, allow: bool) {
        self.inner.allow_anonymous.store(allow, Ordering::Relaxed);
    }

    /// Open an authenticated connection.
    pub fn connect(&self, identity: &str, secret: &str) -> Result<Connection, BrokerError> {
        let accepted = self.inner.allow_anonymous.load(Ordering::Relaxed)
            || self
                .inner
                .users
                .read()
                .get(identity)
                .is_some_and(|expected| expected == secret);

        if !accepted {
            self.inner
                .stats
                .authentication_failures
                .fetch_add(1, Ordering::Relaxed);
            warn!(user = identity, "Broker authentication failed");
            return Err(BrokerError::AuthenticationFailed(identity.to_string()));
        }

        let id = ConnectionId(self.inner.next_connection.fetch_add(1, Ordering::Relaxed));
        self.inner
            .stats
            .connections_opened
            .fetch_add(1, Ordering::Relaxed);
        debug!(connection = %id, user = identity, "Connection opened");

        Ok(Connection {
            id,
            identity: identity.to_string(),
            broker: Arc::clone(&self.inner),
            temp_sequence: AtomicU64::new(1),
            temporary: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of buffered messages on a queue (0 if it does not exist).
    #[must_use]
    pub fn queue_depth(&self, name: &str) -> usize {
        self.inner
            .queues
            .read()
            .get(name)
            .map_or(0, |queue| queue.depth())
    }

    /// Whether a queue currently exists.
    #[must_use]
    pub fn has_queue(&self, name: &str) -> bool {
        self.inner.queues.read().contains_key(name)
    }

    /// Number of existing queues.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.inner.queues.read().len()
    }

    /// Broker counters.
    #[must_use]
    pub fn stats(&self) -> &BrokerStats {
        &self.inner.stats
    }

    /// Connections opened and not yet closed.
    #[must_use]
    pub fn live_connections(&self) -> u64 {
        let stats = &self.inner.stats;
        let opened = stats.connections_opened.load(Ordering::Relaxed);
        opened.saturating_sub(stats.connections_closed.load(Ordering::Relaxed))
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// An authenticated client connection.
///
/// Closing the connection (explicitly or by dropping it) deletes the
/// temporary queues it created.
pub struct Connection {
    id: ConnectionId,
    identity: String,
    broker: Arc<BrokerInner>,
    temp_sequence: AtomicU64,
    temporary: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Connection {
    /// Connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            Err(BrokerError::ConnectionClosed(self.id))
        } else {
            Ok(())
        }
    }

    /// Create a temporary queue owned by this connection.
    pub fn create_temporary_queue(&self) -> Result<String, BrokerError> {
        self.ensure_open()?;

        let seq = self.temp_sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}{}:{}", TEMP_QUEUE_PREFIX, self.id, seq);
        let queue = Arc::new(Queue::new(&name, Some(self.id), self.broker.capacity));

        self.broker.queues.write().insert(name.clone(), queue);
        self.temporary.lock().push(name.clone());
        self.broker
            .stats
            .temporary_queues_created
            .fetch_add(1, Ordering::Relaxed);

        debug!(connection = %self.id, queue = %name, "Temporary queue created");
        Ok(name)
    }

    /// Put a message on a queue.
    pub fn send(&self, queue: &str, message: Message) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let target = self.broker.queue(queue)?;
        target.offer(message)?;
        self.broker
            .stats
            .messages_sent
            .fetch_add(1, Ordering::Relaxed);
        debug!(connection = %self.id, queue = queue, "Message sent");
        Ok(())
    }

    /// Wait up to `timeout` for a message on a queue.
    ///
    /// Returns `Ok(None)` when the timeout elapses.
    pub async fn receive(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Message>, BrokerError> {
        self.ensure_open()?;
        let source = self.broker.queue(queue)?;
        if let Some(owner) = source.owner() {
            if owner != self.id {
                return Err(BrokerError::NotOwner(queue.to_string()));
            }
        }

        match source.take(timeout).await {
            Take::Message(message) => {
                self.broker
                    .stats
                    .messages_delivered
                    .fetch_add(1, Ordering::Relaxed);
                Ok(Some(message))
            }
            Take::TimedOut => Ok(None),
            Take::Deleted if self.is_closed() => Err(BrokerError::ConnectionClosed(self.id)),
            Take::Deleted => Err(BrokerError::UnknownDestination(queue.to_string())),
        }
    }

    /// Close the connection and delete its temporary queues.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.broker
            .stats
            .connections_closed
            .fetch_add(1, Ordering::Relaxed);
        let temporary = std::mem::take(&mut *self.temporary.lock());
        let mut queues = self.broker.queues.write();
        for name in &temporary {
            if let Some(queue) = queues.remove(name) {
                queue.delete();
            }
        }
        debug!(
            connection = %self.id,
            temporary_queues = temporary.len(),
            "Connection closed"
        );
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBroker")
            .field("queues", &self.queue_count())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
