//! Bridge server: wiring, router and lifecycle.

use crate::adapters::{self, PendingReplyStore};
use crate::bridge::BridgeService;
use crate::cache::{self, ResourceCache};
use crate::domain::{BridgeConfig, ServerError};
use crate::front::handler::{forward, health, metrics};
use crate::front::AppState;
use crate::gateway::{self, BridgeGateway};
use crate::middleware::{BridgeMetrics, TracingLayer};
use crate::ports::{EndpointDirectory, MessageBroker};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

/// HTTP bridge server
pub struct BridgeServer {
    config: Arc<BridgeConfig>,
    service: BridgeService,
}

impl BridgeServer {
    /// Build the server from validated configuration and broker ports.
    pub fn new(
        config: BridgeConfig,
        directory: Arc<dyn EndpointDirectory>,
        broker: Arc<dyn MessageBroker>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let cache = Arc::new(ResourceCache::with_config(directory, broker, &config.cache));
        let gateway = Arc::new(BridgeGateway::with_store(
            config.broker.reply_matching,
            Arc::new(PendingReplyStore::new()),
        ));
        let metrics = Arc::new(BridgeMetrics::new());

        Ok(Self {
            config: Arc::new(config),
            service: BridgeService::new(cache, gateway, metrics),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn service(&self) -> &BridgeService {
        &self.service
    }

    /// Router with every route and layer, without binding a socket.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.service.clone(), Arc::clone(&self.config));

        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .fallback(forward)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_body_bytes))
            .layer(TracingLayer::new())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(ServerError::Bind)?;
        let cleanup = self.start_cleanup_tasks();
        let router = self.router();

        info!(
            addr = %addr,
            base_path = %self.config.http.base_path,
            reply_matching = ?self.config.broker.reply_matching,
            reply_timeout_ms = self.config.timeouts.reply.as_millis() as u64,
            "Bridge listening"
        );

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        for task in cleanup {
            task.abort();
        }
        self.service.gateway().shutdown();
        self.service.cache().close_all().await;

        match result {
            Ok(()) => {
                info!("Bridge stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Bridge server error");
                Err(ServerError::Serve(e))
            }
        }
    }

    /// Start background cleanup tasks
    fn start_cleanup_tasks(&self) -> Vec<JoinHandle<()>> {
        let interval = self.config.cache.cleanup_interval;

        // Waiters whose request future was dropped
        let pending = Arc::clone(self.service.gateway().pending());
        let pending_task = tokio::spawn(adapters::cleanup_task(pending, interval));

        // Idle cache entries (no-op without a TTL)
        let resources = Arc::clone(self.service.cache());
        let cache_task = tokio::spawn(cache::cleanup_task(resources, interval));

        // Listeners of channels that went away with their session
        let gateway = Arc::clone(self.service.gateway());
        let listener_task = tokio::spawn(gateway::cleanup_task(gateway, interval));

        vec![pending_task, cache_task, listener_task]
    }
}
