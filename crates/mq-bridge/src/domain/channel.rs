//! Reply channel address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broker-side private address where replies for one credential arrive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplyChannel(String);

impl ReplyChannel {
    /// Wrap a broker address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Broker address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
