//! # Integration Flows
//!
//! Every flow runs against the in-memory broker through the real adapter,
//! so the bridge sees the same ports it sees in production.

pub mod concurrency;
pub mod http_front;
pub mod round_trip;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use axum::response::Response;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use http_body_util::BodyExt;
    use mq_broker::{Connection, InMemoryBroker};
    use mq_bridge::{
        BridgeConfig, BridgeGateway, BridgeMetrics, BridgeServer, BridgeService,
        InMemoryBrokerAdapter, ReplyMatching, ResourceCache, StaticDirectory,
    };

    pub const ENDPOINT: &str = "jms/ConnectionFactory";

    /// Broker with `alice:secret`, `bob:hunter2` and the service user `svc:pw`.
    pub fn broker() -> InMemoryBroker {
        let broker = InMemoryBroker::new();
        broker.add_user("alice", "secret");
        broker.add_user("bob", "hunter2");
        broker.add_user("svc", "pw");
        broker
    }

    /// Connection for a service-side consumer or responder.
    pub fn service_connection(broker: &InMemoryBroker) -> Arc<Connection> {
        Arc::new(broker.connect("svc", "pw").unwrap())
    }

    pub fn cache(broker: &InMemoryBroker) -> Arc<ResourceCache> {
        Arc::new(ResourceCache::new(
            Arc::new(StaticDirectory::new(ENDPOINT)),
            Arc::new(InMemoryBrokerAdapter::new(broker.clone())),
        ))
    }

    pub fn bridge_service(broker: &InMemoryBroker, matching: ReplyMatching) -> BridgeService {
        BridgeService::new(
            cache(broker),
            Arc::new(BridgeGateway::new(matching)),
            Arc::new(BridgeMetrics::new()),
        )
    }

    pub fn server(config: BridgeConfig, broker: &InMemoryBroker) -> BridgeServer {
        BridgeServer::new(
            config,
            Arc::new(StaticDirectory::new(ENDPOINT)),
            Arc::new(InMemoryBrokerAdapter::new(broker.clone())),
        )
        .unwrap()
    }

    pub fn basic(user: &str, secret: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:{}", user, secret)))
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
