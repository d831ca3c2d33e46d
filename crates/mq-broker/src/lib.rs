//! # MQ Broker - In-Memory Message Broker
//!
//! A small, process-local message broker used to run the bridge without an
//! external middleware and to exercise it in tests.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐   send(queue)    ┌──────────────────┐   receive(queue)  ┌──────────────┐
//! │  Connection  │ ───────────────→ │  Named Queue     │ ────────────────→ │  Responder   │
//! │  (bridge)    │                  └──────────────────┘                   │  (service)   │
//! │              │   receive(temp)  ┌──────────────────┐   send(reply_to)  │              │
//! │              │ ←─────────────── │  Temporary Queue │ ←──────────────── │              │
//! └──────────────┘                  └──────────────────┘                   └──────────────┘
//! ```
//!
//! - Connections authenticate against a user registry.
//! - Named queues are created on first use, up to a broker-wide limit
//!   ([`DEFAULT_MAX_NAMED_QUEUES`]). They are never removed.
//! - Temporary queues belong to the connection that created them; only the
//!   owner may consume from them and they disappear when it closes.
//!
//! There is no persistence and no delivery guarantee beyond the lifetime of
//! the broker value.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod broker;
pub mod error;
pub mod message;
pub mod queue;
pub mod responder;

pub use broker::{BrokerStats, Connection, ConnectionId, InMemoryBroker};
pub use error::BrokerError;
pub use message::{Message, MessageBody, MessageId};
pub use responder::{echo, Responder};

/// Maximum messages buffered per queue before `QueueFull` is returned.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Named queues a broker creates on demand before sends to new names fail.
pub const DEFAULT_MAX_NAMED_QUEUES: usize = 10_000;

/// Prefix of temporary queue names.
pub const TEMP_QUEUE_PREFIX: &str = "temp-queue://";
