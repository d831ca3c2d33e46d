//! Request and outcome types of one bridge round trip.

use crate::domain::credential::Credential;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Terminal state of a send-and-await-reply invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// A text reply arrived within the timeout.
    Delivered(String),
    /// The timeout elapsed without a reply.
    Empty,
    /// A reply arrived but it did not carry text.
    NonTextReply,
    /// The broker failed while sending or receiving.
    BrokerError(String),
}

impl ReplyOutcome {
    /// Status tag of this outcome.
    pub fn status(&self) -> ReplyStatus {
        match self {
            Self::Delivered(_) => ReplyStatus::Delivered,
            Self::Empty => ReplyStatus::Empty,
            Self::NonTextReply => ReplyStatus::NonTextReply,
            Self::BrokerError(_) => ReplyStatus::BrokerError,
        }
    }

    /// Whether a reply payload is available.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    /// Convert into the transport-facing response.
    ///
    /// Only `Delivered` carries a body.
    pub fn into_response(self) -> BridgeResponse {
        let status = self.status();
        let body = match self {
            Self::Delivered(payload) => payload,
            _ => String::new(),
        };
        BridgeResponse { status, body }
    }
}

/// Outcome tag exposed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Delivered,
    Empty,
    NonTextReply,
    BrokerError,
}

impl ReplyStatus {
    /// Stable lowercase name, used in headers and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Empty => "empty",
            Self::NonTextReply => "non_text_reply",
            Self::BrokerError => "broker_error",
        }
    }
}

/// Inbound call as handed over by the transport front end.
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    /// Destination queue name.
    pub destination: String,
    /// Text payload to forward.
    pub payload: String,
    /// Caller credentials.
    pub credential: Credential,
    /// How long to wait for the reply.
    pub timeout: Duration,
}

/// Result of a bridge round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub status: ReplyStatus,
    pub body: String,
}
