//! # MQ Bridge Runtime
//!
//! Process wiring for the bridge binary.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (JSON file named by `MQB_CONFIG`, then env overrides)
//! 2. Validate it
//! 3. Seed the in-memory broker with users and echo responders
//! 4. Serve HTTP until the shutdown signal
//!
//! ## Modules
//!
//! - `config` - file and environment loading
//! - `runtime` - broker seeding and server lifecycle

pub mod config;
pub mod runtime;

pub use config::{load_config, load_config_with, RuntimeConfig, SeedConfig, UserEntry};
pub use runtime::BridgeRuntime;
