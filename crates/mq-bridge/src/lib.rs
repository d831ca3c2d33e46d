// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! MQ Bridge - synchronous HTTP request/reply over a message broker.
//!
//! An HTTP request names a destination queue and carries a text payload.
//! The bridge sends the payload to that queue, waits a bounded time for the
//! reply on a private channel, and returns the reply text as the response.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           MQ BRIDGE                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  HTTP front end  (Basic credentials, line joining, rendering)   │
//! │         │                                                        │
//! │  ┌──────┴─────────────────────────┐                              │
//! │  │         BridgeService          │                              │
//! │  └──────┬──────────────────┬──────┘                              │
//! │         │                  │                                     │
//! │  ┌──────┴───────┐   ┌──────┴────────────────────────────┐        │
//! │  │ ResourceCache│   │ BridgeGateway                     │        │
//! │  │ Credential → │   │ send, then await reply:           │        │
//! │  │  session +   │   │  correlated (listener + pending)  │        │
//! │  │  reply chan  │   │  or shared channel receive        │        │
//! │  └──────┬───────┘   └──────┬────────────────────────────┘        │
//! │         └────────┬─────────┘                                     │
//! │          Broker ports (EndpointDirectory, MessageBroker,         │
//! │                        BrokerSession)                            │
//! └──────────────────┼───────────────────────────────────────────────┘
//!                    │
//!              Message broker
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mq_bridge::{BridgeConfig, BridgeServer, InMemoryBrokerAdapter, StaticDirectory};
//!
//! let config = BridgeConfig::default();
//! let server = BridgeServer::new(
//!     config.clone(),
//!     Arc::new(StaticDirectory::new(&config.broker.endpoint)),
//!     Arc::new(InMemoryBrokerAdapter::new(broker)),
//! )?;
//! server.run(shutdown_signal).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod bridge;
pub mod cache;
pub mod domain;
pub mod front;
pub mod gateway;
pub mod middleware;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use adapters::{InMemoryBrokerAdapter, PendingReplyStore, StaticDirectory};
pub use bridge::BridgeService;
pub use cache::{CacheSnapshot, ResourceCache};
pub use domain::{
    AuthError, BridgeConfig, BridgeError, BridgeRequest, BridgeResponse, BridgeResult, BrokerError,
    ConfigError, ConnectionError, CorrelationId, Credential, ReplyChannel, ReplyMatching,
    ReplyOutcome, ReplyStatus, ServerError,
};
pub use gateway::BridgeGateway;
pub use middleware::BridgeMetrics;
pub use ports::{
    BrokerSession, ConnectionHandle, EndpointDirectory, EndpointRef, InboundBody, InboundMessage,
    MessageBroker, OutboundMessage,
};
pub use service::BridgeServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
