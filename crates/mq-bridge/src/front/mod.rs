//! HTTP front end.
//!
//! `GET|POST {base_path}/{destination}` with Basic credentials. The body is
//! forwarded as the message text and the reply text comes back as the
//! response body.

pub mod auth;
pub mod handler;
pub mod payload;

pub use auth::{challenge, credential_from_headers, decode_basic};
pub use handler::{destination_of, status_code, AppState};
pub use payload::{join_lines, reassemble};

/// Response header naming the reply outcome (`delivered`, `empty`, ...).
pub const BRIDGE_STATUS_HEADER: &str = "x-bridge-status";

/// Request header overriding the reply timeout, in milliseconds.
pub const REPLY_TIMEOUT_HEADER: &str = "x-reply-timeout-ms";
