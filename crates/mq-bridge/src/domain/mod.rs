//! Domain types for the bridge.
//!
//! Value types, configuration and the error taxonomy. Nothing in here
//! touches the broker or the network.

pub mod channel;
pub mod config;
pub mod correlation;
pub mod credential;
pub mod error;
pub mod outcome;

// Re-exports for convenience
pub use channel::ReplyChannel;
pub use config::{
    BridgeConfig, BrokerConfig, CacheConfig, CompatConfig, ConfigError, HttpConfig, LimitsConfig,
    ReplyMatching, TimeoutConfig,
};
pub use correlation::CorrelationId;
pub use credential::Credential;
pub use error::{AuthError, BridgeError, BridgeResult, BrokerError, ConnectionError, ServerError};
pub use outcome::{BridgeRequest, BridgeResponse, ReplyOutcome, ReplyStatus};
