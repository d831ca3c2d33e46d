//! Port adapters over the in-memory broker.

use crate::domain::{BrokerError, ConnectionError, ReplyChannel};
use crate::ports::{
    BrokerSession, ConnectionHandle, EndpointDirectory, EndpointRef, InboundBody, InboundMessage,
    MessageBroker, OutboundMessage,
};
use async_trait::async_trait;
use mq_broker::{Connection, InMemoryBroker, Message, MessageBody};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Directory with a fixed set of bound endpoint names.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    lookup: String,
    bound: HashSet<String>,
}

impl StaticDirectory {
    /// Directory where `name` is bound and looked up.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            bound: HashSet::from([name.clone()]),
            lookup: name,
        }
    }

    /// Directory that looks up `name` but has nothing bound.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            lookup: name.into(),
            bound: HashSet::new(),
        }
    }
}

#[async_trait]
impl EndpointDirectory for StaticDirectory {
    async fn resolve_endpoint(&self) -> Result<EndpointRef, ConnectionError> {
        if self.bound.contains(&self.lookup) {
            Ok(EndpointRef::new(&self.lookup))
        } else {
            Err(ConnectionError::EndpointUnresolved(self.lookup.clone()))
        }
    }
}

/// [`MessageBroker`] over an [`InMemoryBroker`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryBrokerAdapter {
    broker: InMemoryBroker,
}

impl InMemoryBrokerAdapter {
    pub fn new(broker: InMemoryBroker) -> Self {
        Self { broker }
    }

    /// The wrapped broker.
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }
}

#[async_trait]
impl MessageBroker for InMemoryBrokerAdapter {
    async fn authenticate(
        &self,
        endpoint: &EndpointRef,
        identity: &str,
        secret: &str,
    ) -> Result<ConnectionHandle, BrokerError> {
        let connection = self.broker.connect(identity, secret).map_err(|e| match e {
            mq_broker::BrokerError::AuthenticationFailed(_) => {
                BrokerError::AuthenticationRejected(e.to_string())
            }
            other => BrokerError::SendFailed(other.to_string()),
        })?;

        debug!(
            endpoint = %endpoint.name,
            identity = identity,
            connection = %connection.id(),
            "Broker session opened"
        );

        let session = InMemorySession {
            connection: Arc::new(connection),
        };
        Ok(ConnectionHandle::new(Arc::new(session), identity))
    }
}

/// One broker connection seen through [`BrokerSession`].
pub struct InMemorySession {
    connection: Arc<Connection>,
}

impl InMemorySession {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

fn lost_or(err: mq_broker::BrokerError, wrap: fn(String) -> BrokerError) -> BrokerError {
    if err.is_connection_lost() {
        BrokerError::SessionClosed
    } else {
        wrap(err.to_string())
    }
}

#[async_trait]
impl BrokerSession for InMemorySession {
    fn session_id(&self) -> String {
        self.connection.id().to_string()
    }

    fn is_open(&self) -> bool {
        !self.connection.is_closed()
    }

    async fn allocate_private_channel(&self) -> Result<ReplyChannel, BrokerError> {
        self.connection
            .create_temporary_queue()
            .map(ReplyChannel::new)
            .map_err(|e| lost_or(e, BrokerError::ChannelAllocation))
    }

    async fn send(&self, destination: &str, message: OutboundMessage) -> Result<(), BrokerError> {
        let mut wire = Message::text(message.text).with_reply_to(message.reply_to.as_str());
        if let Some(id) = message.correlation_id {
            wire = wire.with_correlation_id(id.to_string());
        }
        self.connection
            .send(destination, wire)
            .map_err(|e| lost_or(e, BrokerError::SendFailed))
    }

    async fn receive(
        &self,
        channel: &ReplyChannel,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, BrokerError> {
        let received = self
            .connection
            .receive(channel.as_str(), timeout)
            .await
            .map_err(|e| lost_or(e, BrokerError::ReceiveFailed))?;

        Ok(received.map(|message| InboundMessage {
            body: match message.body {
                MessageBody::Text(text) => InboundBody::Text(text),
                MessageBody::Bytes(_) => InboundBody::Other,
            },
            correlation_id: message.correlation_id,
        }))
    }

    async fn close(&self) {
        self.connection.close();
    }
}
