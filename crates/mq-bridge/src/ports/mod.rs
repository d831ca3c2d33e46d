//! Broker-facing ports.
//!
//! The bridge core only talks to the broker through these traits; adapters
//! in `crate::adapters` bind them to a concrete broker.

pub mod outbound;

pub use outbound::{
    BrokerSession, ConnectionHandle, EndpointDirectory, EndpointRef, InboundBody, InboundMessage,
    MessageBroker, OutboundMessage,
};
