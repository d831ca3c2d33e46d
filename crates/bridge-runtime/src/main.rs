//! # MQ Bridge
//!
//! Entry point for the HTTP request/reply bridge.
//!
//! Configuration comes from the JSON file named by `MQB_CONFIG` plus `MQB_*`
//! environment overrides; log filtering follows `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use bridge_runtime::{load_config, BridgeRuntime};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = load_config().context("Failed to load configuration")?;
    config.bridge.validate().context("Invalid configuration")?;

    let runtime = BridgeRuntime::new(config)?;
    info!("Bridge is starting. Press Ctrl+C to stop.");

    let result = runtime
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown requested");
        })
        .await;

    if let Err(e) = &result {
        error!(error = %e, "Bridge exited with an error");
    }
    result
}
