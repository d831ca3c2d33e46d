//! Adapters for the bridge.
//!
//! Infrastructure implementations: the pending-reply store used by the
//! correlated gateway and the port adapters over the in-memory broker.

pub mod broker_adapter;
pub mod pending;

pub use broker_adapter::{InMemoryBrokerAdapter, InMemorySession, StaticDirectory};
pub use pending::{cleanup_task, PendingReplyStore, PendingSnapshot, PendingStats};
