//! Bridge error taxonomy.
//!
//! | Error | Raised by | Caller sees |
//! |-------|-----------|-------------|
//! | `AuthError::Missing` | front end | 401 + challenge |
//! | `AuthError::Scheme` | front end | 401 + challenge |
//! | `ConnectionError` | resource cache | 500, generic body |
//! | `BrokerError` | broker port | folded into `ReplyOutcome::BrokerError` |

use crate::domain::config::ConfigError;

/// Credential material problems, handled at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credential header on the request.
    #[error("no credentials supplied")]
    Missing,

    /// Header present but not a decodable credential of the expected scheme.
    #[error("invalid authorization header: {0}")]
    Scheme(String),
}

/// Failure to obtain a connection or reply channel. Fatal for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The directory could not resolve the broker endpoint.
    #[error("broker endpoint '{0}' could not be resolved")]
    EndpointUnresolved(String),

    /// The broker refused the credential.
    #[error("broker rejected credentials for '{identity}': {reason}")]
    AuthenticationRejected { identity: String, reason: String },

    /// The broker could not allocate a reply channel.
    #[error("reply channel allocation failed: {0}")]
    ChannelAllocation(String),
}

/// Failure reported by the broker port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Credentials refused.
    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    /// The session is closed and cannot be used again.
    #[error("broker session closed")]
    SessionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Temporary channel allocation failed.
    #[error("channel allocation failed: {0}")]
    ChannelAllocation(String),
}

impl BrokerError {
    /// True when the session must be discarded.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionClosed)
    }
}

/// Errors surfaced by the bridge service to its transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The request did not name a usable destination.
    #[error("invalid destination: '{0}'")]
    InvalidDestination(String),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Server lifecycle errors (not request-level).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration rejected at startup
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener could not be bound
    #[error("server bind error: {0}")]
    Bind(#[source] std::io::Error),

    /// Server loop failed
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
