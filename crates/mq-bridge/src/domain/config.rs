//! Bridge configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Reply wait configuration
    pub timeouts: TimeoutConfig,
    /// Broker wiring
    pub broker: BrokerConfig,
    /// Resource cache bounds
    pub cache: CacheConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// Legacy behavior switches
    pub compat: CompatConfig,
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Invalid("http.port cannot be 0".into()));
        }

        if !self.http.base_path.is_empty() {
            if !self.http.base_path.starts_with('/') {
                return Err(ConfigError::InvalidBasePath(self.http.base_path.clone()));
            }
            if self.http.base_path == "/" || self.http.base_path.ends_with('/') {
                return Err(ConfigError::InvalidBasePath(self.http.base_path.clone()));
            }
        }

        if self.timeouts.reply.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "reply timeout cannot be 0".into(),
            ));
        }
        if self.timeouts.max_reply.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "max_reply timeout cannot be 0".into(),
            ));
        }
        if self.timeouts.reply > self.timeouts.max_reply {
            return Err(ConfigError::InvalidTimeout(format!(
                "reply timeout {:?} exceeds max_reply {:?}",
                self.timeouts.reply, self.timeouts.max_reply
            )));
        }

        if self.broker.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("broker.endpoint cannot be empty".into()));
        }

        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::InvalidLimit(
                "cache.max_entries cannot be 0".into(),
            ));
        }
        if let Some(ttl) = self.cache.idle_ttl {
            if ttl <= self.timeouts.max_reply {
                return Err(ConfigError::InvalidTimeout(format!(
                    "cache.idle_ttl {:?} must exceed max_reply {:?}",
                    ttl, self.timeouts.max_reply
                )));
            }
        }
        if self.cache.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "cache.cleanup_interval cannot be 0".into(),
            ));
        }

        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Reply timeout for a request, honoring an optional caller override.
    ///
    /// Overrides are clamped to `timeouts.max_reply`; a zero override falls
    /// back to the configured default.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(t) if !t.is_zero() => t.min(self.timeouts.max_reply),
            _ => self.timeouts.reply,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8161)
    pub port: u16,
    /// Prefix stripped from the request path to obtain the destination
    pub base_path: String,
    /// Realm announced in the authentication challenge
    pub realm: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8161,
            base_path: String::new(),
            realm: "Bridge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default reply wait
    #[serde(with = "humantime_serde")]
    pub reply: Duration,
    /// Upper bound for caller-supplied overrides
    #[serde(with = "humantime_serde")]
    pub max_reply: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            reply: Duration::from_secs(10),
            max_reply: Duration::from_secs(60),
        }
    }
}

/// How replies are matched to requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMatching {
    /// Fresh correlation id per request, demultiplexed by a listener task
    #[default]
    CorrelationId,
    /// One direct receive on the credential's channel; concurrent requests
    /// of the same credential may see each other's replies
    SharedChannel,
}

impl std::str::FromStr for ReplyMatching {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "correlation_id" | "correlated" => Ok(Self::CorrelationId),
            "shared_channel" | "shared" => Ok(Self::SharedChannel),
            other => Err(ConfigError::Invalid(format!(
                "unknown reply matching mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Directory name of the broker endpoint
    pub endpoint: String,
    pub reply_matching: ReplyMatching,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: "jms/ConnectionFactory".to_string(),
            reply_matching: ReplyMatching::default(),
        }
    }
}

/// Resource cache bounds. Unbounded unless set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Max distinct credentials kept (least recently used evicted first)
    pub max_entries: Option<usize>,
    /// Entries unused for longer than this are closed and dropped
    #[serde(with = "humantime_serde::option")]
    pub idle_ttl: Option<Duration>,
    /// Period of the idle sweep and pending-reply reaper
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            idle_ttl: None,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 1MB)
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Switches reproducing the behavior of the servlet this bridge replaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Join body lines without terminators before forwarding
    pub strip_newlines: bool,
    /// Render every non-delivered outcome as 200 with an empty body
    pub legacy_empty_replies: bool,
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            strip_newlines: true,
            legacy_empty_replies: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Base path must be empty or start with '/' and not end with it
    #[error("invalid base path: '{0}'")]
    InvalidBasePath(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn format_duration(duration: &Duration) -> String {
        if duration.subsec_millis() != 0 {
            format!("{}ms", duration.as_millis())
        } else {
            format!("{}s", duration.as_secs())
        }
    }

    /// Parse "10s", "500ms", "2m" or a bare number of seconds.
    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" first, 'm' and 's' are both suffixes of it
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => super::parse_duration(&s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

pub use humantime_serde::parse_duration;
