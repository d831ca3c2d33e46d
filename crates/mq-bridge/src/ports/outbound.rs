//! Outbound ports for the bridge.

use crate::domain::{BrokerError, ConnectionError, CorrelationId, ReplyChannel};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Resolved broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    pub name: String,
}

impl EndpointRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Locates the broker endpoint (a naming/directory lookup).
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    async fn resolve_endpoint(&self) -> Result<EndpointRef, ConnectionError>;
}

/// Establishes authenticated broker sessions.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Open a session for `identity`. One call, one session.
    async fn authenticate(
        &self,
        endpoint: &EndpointRef,
        identity: &str,
        secret: &str,
    ) -> Result<ConnectionHandle, BrokerError>;
}

/// An open, authenticated broker session.
///
/// Implementations must be usable from many tasks at once.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Broker-assigned id, for logs.
    fn session_id(&self) -> String;

    fn is_open(&self) -> bool;

    /// Allocate a temporary channel only this session can consume.
    async fn allocate_private_channel(&self) -> Result<ReplyChannel, BrokerError>;

    async fn send(&self, destination: &str, message: OutboundMessage) -> Result<(), BrokerError>;

    /// Wait up to `timeout` for one message. `Ok(None)` on timeout.
    async fn receive(
        &self,
        channel: &ReplyChannel,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, BrokerError>;

    /// Close the session, dropping its private channels. Idempotent.
    async fn close(&self);
}

/// Shared handle to a broker session, as cached per credential.
#[derive(Clone)]
pub struct ConnectionHandle {
    session: Arc<dyn BrokerSession>,
    identity: String,
}

impl ConnectionHandle {
    pub fn new(session: Arc<dyn BrokerSession>, identity: impl Into<String>) -> Self {
        Self {
            session,
            identity: identity.into(),
        }
    }

    pub fn session(&self) -> &Arc<dyn BrokerSession> {
        &self.session
    }

    /// Identity the session was opened for.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn session_id(&self) -> String {
        self.session.session_id()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// True when both handles point at the same session object.
    pub fn same_session(&self, other: &ConnectionHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.session) as *const (),
            Arc::as_ptr(&other.session) as *const (),
        )
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("session", &self.session.session_id())
            .field("identity", &self.identity)
            .finish()
    }
}

/// Message sent to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub reply_to: ReplyChannel,
    /// Absent in shared-channel mode.
    pub correlation_id: Option<CorrelationId>,
}

/// Payload of a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundBody {
    Text(String),
    /// Anything that is not text (bytes, maps, objects).
    Other,
}

/// Message received on a reply channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub body: InboundBody,
    /// Raw correlation id as set by the replier.
    pub correlation_id: Option<String>,
}

impl InboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: InboundBody::Text(text.into()),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Correlation id parsed into the bridge's id type, if well-formed.
    pub fn parsed_correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
            .as_deref()
            .and_then(|raw| CorrelationId::parse(raw).ok())
    }
}
