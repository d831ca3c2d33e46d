//! Middleware for the bridge front end.
//!
//! Layer order: Request → Tracing → BodyLimit → Handler

pub mod metrics;
pub mod tracing;

pub use metrics::{BridgeMetrics, RequestTimer};
pub use tracing::{TracingLayer, REQUEST_ID_HEADER};
