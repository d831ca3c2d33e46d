//! # Broker Errors

use crate::broker::ConnectionId;
use thiserror::Error;

/// Errors returned by broker operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Unknown user or wrong secret.
    #[error("authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    /// The connection was closed before or during the operation.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// Temporary destination that was never created or already deleted.
    #[error("destination not found: {0}")]
    UnknownDestination(String),

    /// Another connection owns this temporary destination.
    #[error("temporary destination {0} is owned by another connection")]
    NotOwner(String),

    /// The destination buffer is full.
    #[error("destination {0} is full")]
    QueueFull(String),

    /// Creating the destination would exceed the named queue limit.
    #[error("named queue limit of {0} reached")]
    TooManyQueues(usize),

    /// Empty or otherwise unusable destination name.
    #[error("invalid destination name: '{0}'")]
    InvalidDestination(String),
}

impl BrokerError {
    /// True when the connection can no longer be used.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }
}
