//! Runtime configuration.
//!
//! An optional JSON file (path in `MQB_CONFIG`) is read first, then the
//! `MQB_*` environment variables override individual fields. Malformed
//! overrides are logged and skipped.

use anyhow::{Context, Result};
use mq_bridge::domain::config::parse_duration;
use mq_bridge::{BridgeConfig, ReplyMatching};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Everything the binary needs to start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bridge configuration
    pub bridge: BridgeConfig,
    /// In-memory broker contents
    pub seed: SeedConfig,
}

/// Users and responders created on the in-memory broker at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub users: Vec<UserEntry>,
    /// Queues answered by an echo responder
    pub echo_queues: Vec<String>,
}

/// A broker user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub identity: String,
    pub secret: String,
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<RuntimeConfig> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Load configuration using `env` to look up variables.
pub fn load_config_with<F>(env: F) -> Result<RuntimeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match env("MQB_CONFIG") {
        Some(path) => read_file(Path::new(&path))?,
        None => RuntimeConfig::default(),
    };
    apply_env(&mut config, &env);
    Ok(config)
}

fn read_file(path: &Path) -> Result<RuntimeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    info!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

fn apply_env<F>(config: &mut RuntimeConfig, env: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let bridge = &mut config.bridge;

    if let Some(host) = env("MQB_HTTP_HOST") {
        match host.parse() {
            Ok(h) => bridge.http.host = h,
            Err(_) => warn!(value = %host, "MQB_HTTP_HOST is not an IP address"),
        }
    }
    if let Some(port) = env("MQB_HTTP_PORT") {
        match port.parse() {
            Ok(p) => bridge.http.port = p,
            Err(_) => warn!(value = %port, "MQB_HTTP_PORT is not a port number"),
        }
    }
    if let Some(base_path) = env("MQB_BASE_PATH") {
        bridge.http.base_path = base_path;
    }
    if let Some(endpoint) = env("MQB_ENDPOINT") {
        bridge.broker.endpoint = endpoint;
    }
    if let Some(timeout) = env("MQB_REPLY_TIMEOUT") {
        match parse_duration(&timeout) {
            Ok(d) => bridge.timeouts.reply = d,
            Err(e) => warn!(value = %timeout, error = e, "Ignoring MQB_REPLY_TIMEOUT"),
        }
    }
    if let Some(mode) = env("MQB_REPLY_MATCHING") {
        match mode.parse::<ReplyMatching>() {
            Ok(m) => bridge.broker.reply_matching = m,
            Err(e) => warn!(error = %e, "Ignoring MQB_REPLY_MATCHING"),
        }
    }
    if let Some(flag) = env("MQB_LEGACY_EMPTY_REPLIES") {
        match parse_flag(&flag) {
            Some(b) => bridge.compat.legacy_empty_replies = b,
            None => warn!(value = %flag, "MQB_LEGACY_EMPTY_REPLIES is not a boolean"),
        }
    }
    if let Some(flag) = env("MQB_STRIP_NEWLINES") {
        match parse_flag(&flag) {
            Some(b) => bridge.compat.strip_newlines = b,
            None => warn!(value = %flag, "MQB_STRIP_NEWLINES is not a boolean"),
        }
    }

    if let Some(users) = env("MQB_USERS") {
        config.seed.users.extend(parse_users(&users));
    }
    if let Some(queues) = env("MQB_ECHO_QUEUES") {
        config.seed.echo_queues.extend(
            queues
                .split(',')
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(String::from),
        );
    }
}

/// Parse `identity:secret` pairs separated by commas.
///
/// The secret is everything after the first colon. Entries without a colon
/// or with an empty identity are skipped.
pub fn parse_users(raw: &str) -> Vec<UserEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once(':') {
            Some((identity, secret)) if !identity.is_empty() => Some(UserEntry {
                identity: identity.to_string(),
                secret: secret.to_string(),
            }),
            _ => {
                warn!(entry = entry, "Skipping malformed MQB_USERS entry");
                None
            }
        })
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
