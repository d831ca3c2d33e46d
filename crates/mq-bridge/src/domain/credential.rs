//! Credential value type.
//!
//! A credential is both the authentication material presented to the broker
//! and the key of the resource cache, so equality and hashing are derived
//! purely from its two fields.

use std::fmt;

/// Identity/secret pair taken from an inbound request.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    identity: String,
    secret: String,
}

impl Credential {
    /// Create a credential.
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// User identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Secret presented to the broker.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Secrets never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}
