//! Broker seeding and server lifecycle.

use crate::config::RuntimeConfig;
use anyhow::{Context, Result};
use mq_broker::{echo, InMemoryBroker, Responder};
use mq_bridge::{BridgeServer, InMemoryBrokerAdapter, StaticDirectory};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Identity the echo responders connect with.
const RESPONDER_IDENTITY: &str = "bridge-responder";

/// The bridge process: an in-memory broker plus the HTTP server in front
/// of it.
pub struct BridgeRuntime {
    config: RuntimeConfig,
    broker: InMemoryBroker,
    server: BridgeServer,
    responder_secret: String,
}

impl BridgeRuntime {
    /// Validate `config`, seed broker users and build the server.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let broker = InMemoryBroker::new();
        for user in &config.seed.users {
            broker.add_user(user.identity.clone(), user.secret.clone());
        }

        // Never handed out, only the responders use it
        let responder_secret = uuid::Uuid::new_v4().to_string();
        broker.add_user(RESPONDER_IDENTITY, responder_secret.clone());

        let server = BridgeServer::new(
            config.bridge.clone(),
            Arc::new(StaticDirectory::new(&config.bridge.broker.endpoint)),
            Arc::new(InMemoryBrokerAdapter::new(broker.clone())),
        )
        .context("Invalid bridge configuration")?;

        Ok(Self {
            config,
            broker,
            server,
            responder_secret,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bridge.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let responders = self.start_responders()?;

        info!("===========================================");
        info!("  MQ Bridge v{}", mq_bridge::VERSION);
        info!("  Users: {}", self.config.seed.users.len());
        info!("  Echo queues: {:?}", self.config.seed.echo_queues);
        info!("===========================================");

        let result = self.server.serve(listener, shutdown).await;

        for responder in responders {
            responder.stop();
        }
        result.context("Bridge server failed")
    }

    fn start_responders(&self) -> Result<Vec<Responder>> {
        self.config
            .seed
            .echo_queues
            .iter()
            .map(|queue| {
                let connection = self
                    .broker
                    .connect(RESPONDER_IDENTITY, &self.responder_secret)
                    .context("Responder could not connect")?;
                Ok(Responder::spawn(Arc::new(connection), queue.clone(), echo))
            })
            .collect()
    }
}
