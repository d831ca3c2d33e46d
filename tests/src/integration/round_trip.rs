//! # Round Trip Flows
//!
//! Bridge service → in-memory broker → service-side consumer → reply channel
//! → bridge service.
//!
//! ## Flows Tested:
//!
//! 1. **Delivered**: a responder answers within the timeout
//! 2. **Empty**: nobody answers, the wait ends at the timeout
//! 3. **Reordered replies**: correlated mode hands each caller its own reply
//! 4. **Stray replies**: unknown correlation ids are discarded
//! 5. **Session loss**: the next request reopens the session

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use mq_broker::{echo, Message, MessageBody, Responder};
    use mq_bridge::{BridgeRequest, CorrelationId, Credential, ReplyMatching, ReplyStatus};

    use crate::integration::fixtures::{bridge_service, broker, service_connection};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn request(destination: &str, payload: &str, timeout: Duration) -> BridgeRequest {
        BridgeRequest {
            destination: destination.into(),
            payload: payload.into(),
            credential: Credential::new("alice", "secret"),
            timeout,
        }
    }

    /// Answers "ping" with "pong" and ignores anything else.
    fn ping_pong(request: &Message) -> Option<MessageBody> {
        match request.as_text() {
            Some("ping") => Some(MessageBody::Text("pong".into())),
            _ => None,
        }
    }

    // =============================================================================
    // DELIVERED AND EMPTY
    // =============================================================================

    #[tokio::test]
    async fn test_ping_is_answered_with_pong() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "ping", ping_pong);
        let service = bridge_service(&broker, ReplyMatching::CorrelationId);

        let response = service
            .forward(request("ping", "ping", Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(response.status, ReplyStatus::Delivered);
        assert_eq!(response.body, "pong");
    }

    #[tokio::test]
    async fn test_ping_is_answered_in_shared_channel_mode() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "ping", ping_pong);
        let service = bridge_service(&broker, ReplyMatching::SharedChannel);

        let response = service
            .forward(request("ping", "ping", Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(response.status, ReplyStatus::Delivered);
        assert_eq!(response.body, "pong");
    }

    #[tokio::test]
    async fn test_silent_destination_returns_empty_at_timeout() {
        let broker = broker();
        let timeout = Duration::from_millis(200);

        for matching in [ReplyMatching::CorrelationId, ReplyMatching::SharedChannel] {
            let service = bridge_service(&broker, matching);
            let started = Instant::now();
            let response = service
                .forward(request("nobody-home", "hello", timeout))
                .await
                .unwrap();
            let elapsed = started.elapsed();

            assert_eq!(response.status, ReplyStatus::Empty, "{:?}", matching);
            assert!(response.body.is_empty());
            assert!(elapsed >= timeout, "{:?} returned after {:?}", matching, elapsed);
            assert!(
                elapsed < timeout + Duration::from_millis(500),
                "{:?} returned after {:?}",
                matching,
                elapsed
            );
        }
    }

    #[tokio::test]
    async fn test_request_without_answer_from_handler_is_empty() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "ping", ping_pong);
        let service = bridge_service(&broker, ReplyMatching::CorrelationId);

        let response = service
            .forward(request("ping", "not a ping", Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(response.status, ReplyStatus::Empty);
        assert_eq!(service.gateway().pending().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_binary_reply_is_non_text() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "blob", |_: &Message| {
            Some(MessageBody::Bytes(vec![0xde, 0xad]))
        });
        let service = bridge_service(&broker, ReplyMatching::CorrelationId);

        let response = service
            .forward(request("blob", "give me bytes", Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(response.status, ReplyStatus::NonTextReply);
        assert!(response.body.is_empty());
    }

    // =============================================================================
    // CORRELATION
    // =============================================================================

    /// Two requests of one credential whose replies come back in reverse order.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reordered_replies_reach_their_own_callers() {
        let broker = broker();
        let svc = service_connection(&broker);
        let consumer = tokio::spawn(async move {
            let first = svc.receive("swap", Duration::from_secs(5)).await.unwrap().unwrap();
            let second = svc.receive("swap", Duration::from_secs(5)).await.unwrap().unwrap();
            for request in [&second, &first] {
                let text = request.as_text().unwrap_or_default();
                let reply = request.reply(MessageBody::Text(format!("re:{}", text)));
                svc.send(request.reply_to.as_deref().unwrap(), reply).unwrap();
            }
        });

        let service = bridge_service(&broker, ReplyMatching::CorrelationId);
        let (a, b) = tokio::join!(
            service.forward(request("swap", "a", Duration::from_secs(5))),
            service.forward(request("swap", "b", Duration::from_secs(5))),
        );
        consumer.await.unwrap();

        assert_eq!(a.unwrap().body, "re:a");
        assert_eq!(b.unwrap().body, "re:b");
        // Both requests shared one session and one reply channel
        assert_eq!(service.cache().snapshot().channels_created, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_requests_each_get_their_echo() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "echo", echo);
        let service = bridge_service(&broker, ReplyMatching::CorrelationId);

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    let payload = format!("message-{}", i);
                    let response = service
                        .forward(request("echo", &payload, Duration::from_secs(5)))
                        .await
                        .unwrap();
                    (payload, response)
                })
            })
            .collect();

        for task in tasks {
            let (payload, response) = task.await.unwrap();
            assert_eq!(response.status, ReplyStatus::Delivered);
            assert_eq!(response.body, payload);
        }
        assert_eq!(service.cache().snapshot().connections_created, 1);
        assert_eq!(service.gateway().pending().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_stray_replies_are_discarded() {
        let broker = broker();
        let svc = service_connection(&broker);
        let consumer = tokio::spawn(async move {
            let request = svc.receive("stray", Duration::from_secs(5)).await.unwrap().unwrap();
            let reply_to = request.reply_to.clone().unwrap();
            let unknown = Message::text("not yours").with_correlation_id(CorrelationId::new().to_string());
            let garbage = Message::text("not anyone's").with_correlation_id("not-a-uuid");
            svc.send(&reply_to, unknown).unwrap();
            svc.send(&reply_to, garbage).unwrap();
        });

        let service = bridge_service(&broker, ReplyMatching::CorrelationId);
        let response = service
            .forward(request("stray", "hello", Duration::from_millis(400)))
            .await
            .unwrap();
        consumer.await.unwrap();

        assert_eq!(response.status, ReplyStatus::Empty);
        let pending = service.gateway().pending().snapshot();
        assert_eq!(pending.unmatched, 2);
        assert_eq!(pending.completed, 0);
        assert_eq!(pending.pending, 0);
    }

    // =============================================================================
    // SESSION LOSS
    // =============================================================================

    #[tokio::test]
    async fn test_lost_session_is_reopened_on_next_request() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "echo", echo);
        let service = bridge_service(&broker, ReplyMatching::CorrelationId);
        let alice = Credential::new("alice", "secret");

        let (handle, _) = service.cache().acquire(&alice).await.unwrap();
        handle.session().close().await;

        let response = service
            .forward(request("echo", "first", Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(response.status, ReplyStatus::BrokerError);
        assert!(!service.cache().contains(&alice));

        let response = service
            .forward(request("echo", "second", Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(response.status, ReplyStatus::Delivered);
        assert_eq!(response.body, "second");
        assert_eq!(service.cache().snapshot().connections_created, 2);
    }

    #[tokio::test]
    async fn test_metrics_follow_outcomes() {
        let broker = broker();
        let _responder = Responder::spawn(service_connection(&broker), "ping", ping_pong);
        let service = bridge_service(&broker, ReplyMatching::CorrelationId);

        service
            .forward(request("ping", "ping", Duration::from_secs(2)))
            .await
            .unwrap();
        service
            .forward(request("ping", "silence", Duration::from_millis(100)))
            .await
            .unwrap();
        let _ = service
            .forward(BridgeRequest {
                credential: Credential::new("alice", "wrong"),
                ..request("ping", "ping", Duration::from_millis(100))
            })
            .await;

        let json = service.metrics().to_json();
        assert_eq!(json["requests"]["total"], 3);
        assert_eq!(json["outcomes"]["delivered"], 1);
        assert_eq!(json["outcomes"]["empty"], 1);
        assert_eq!(json["requests"]["connection_errors"], 1);
    }
}
