//! # Broker Messages
//!
//! A message carries a text or binary body plus the two headers the
//! request/reply pattern needs: where to send the reply and which request
//! the reply belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Broker-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID:{}", self.0)
    }
}

/// Message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// Text payload.
    Text(String),
    /// Opaque binary payload.
    Bytes(Vec<u8>),
}

/// A message as stored on a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id.
    pub id: MessageId,
    /// Payload.
    pub body: MessageBody,
    /// Destination the receiver should answer to.
    pub reply_to: Option<String>,
    /// Correlation token copied from request to reply.
    pub correlation_id: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Message {
    /// Create a message with the given body and no headers.
    #[must_use]
    pub fn new(body: MessageBody) -> Self {
        Self {
            id: MessageId::new(),
            body,
            reply_to: None,
            correlation_id: None,
            timestamp_ms: now_ms(),
        }
    }

    /// Create a text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MessageBody::Text(text.into()))
    }

    /// Create a binary message.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageBody::Bytes(bytes.into()))
    }

    /// Set the reply destination.
    #[must_use]
    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    /// Set the correlation token.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Text body, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(text),
            MessageBody::Bytes(_) => None,
        }
    }

    /// Build a reply to this message, carrying over the correlation token.
    #[must_use]
    pub fn reply(&self, body: MessageBody) -> Self {
        let mut reply = Self::new(body);
        reply.correlation_id = self.correlation_id.clone();
        reply
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
