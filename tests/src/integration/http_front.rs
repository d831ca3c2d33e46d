//! # HTTP Front End Flows
//!
//! Requests go through the full router (body limit, tracing, handlers) with
//! `tower::ServiceExt::oneshot`; the broker side is real.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use mq_broker::{echo, InMemoryBroker, Message, MessageBody, Responder};
    use mq_bridge::BridgeConfig;
    use tower::ServiceExt;

    use crate::integration::fixtures::{basic, body_text, broker, server, service_connection};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Harness {
        broker: InMemoryBroker,
        router: Router,
        _responders: Vec<Responder>,
    }

    fn harness(config: BridgeConfig) -> Harness {
        let broker = broker();
        let responders = vec![
            Responder::spawn(service_connection(&broker), "echo", echo),
            Responder::spawn(service_connection(&broker), "blob", |_: &Message| {
                Some(MessageBody::Bytes(vec![1, 2, 3]))
            }),
        ];
        let router = server(config, &broker).router();
        Harness {
            broker,
            router,
            _responders: responders,
        }
    }

    fn post(path: &str, authorization: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post(path);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn alice() -> String {
        basic("alice", "secret")
    }

    fn quick_config() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.timeouts.reply = Duration::from_millis(200);
        config
    }

    // =============================================================================
    // CREDENTIALS
    // =============================================================================

    #[tokio::test]
    async fn test_missing_credentials_are_challenged() {
        let h = harness(BridgeConfig::default());

        let response = h.router.oneshot(post("/echo", None, "hello")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Bridge\""
        );
        assert_eq!(body_text(response).await, "auth");
    }

    #[tokio::test]
    async fn test_other_scheme_is_challenged_without_broker_contact() {
        let h = harness(BridgeConfig::default());
        let before = h.broker.stats().connections_opened.load(Ordering::Relaxed);

        let response = h
            .router
            .oneshot(post("/echo", Some("Bearer abc.def.ghi"), "hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        let after = h.broker.stats().connections_opened.load(Ordering::Relaxed);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_configured_realm_in_challenge() {
        let mut config = BridgeConfig::default();
        config.http.realm = "Orders".into();
        let h = harness(config);

        let response = h.router.oneshot(post("/echo", None, "")).await.unwrap();
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Orders\""
        );
    }

    #[tokio::test]
    async fn test_credential_without_colon_has_empty_secret() {
        let h = harness(BridgeConfig::default());
        h.broker.add_user("dave", "");
        let authorization = format!("Basic {}", BASE64.encode("dave"));

        let response = h
            .router
            .oneshot(post("/echo", Some(&authorization), "hi"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "hi");
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_a_generic_server_error() {
        let h = harness(BridgeConfig::default());

        let response = h
            .router
            .oneshot(post("/echo", Some(&basic("alice", "wrong")), "hi"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(!body.contains("alice"));
        assert!(!body.contains("wrong"));
    }

    // =============================================================================
    // ROUTING AND FRAMING
    // =============================================================================

    #[tokio::test]
    async fn test_empty_destination_is_bad_request() {
        let h = harness(BridgeConfig::default());

        let response = h.router.oneshot(post("/", Some(&alice()), "hi")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let h = harness(BridgeConfig::default());
        let request = Request::delete("/echo")
            .header(header::AUTHORIZATION, alice())
            .body(Body::empty())
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_get_forwards_too() {
        let h = harness(BridgeConfig::default());
        let request = Request::get("/echo")
            .header(header::AUTHORIZATION, alice())
            .body(Body::from("from a get"))
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "from a get");
    }

    #[tokio::test]
    async fn test_body_lines_are_joined() {
        let h = harness(BridgeConfig::default());

        let response = h
            .router
            .oneshot(post("/echo", Some(&alice()), "line1\nline2\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "line1line2");
    }

    #[tokio::test]
    async fn test_body_verbatim_when_joining_disabled() {
        let mut config = BridgeConfig::default();
        config.compat.strip_newlines = false;
        let h = harness(config);

        let response = h
            .router
            .oneshot(post("/echo", Some(&alice()), "line1\r\nline2\n"))
            .await
            .unwrap();

        assert_eq!(body_text(response).await, "line1\r\nline2\n");
    }

    // =============================================================================
    // OUTCOME RENDERING
    // =============================================================================

    #[tokio::test]
    async fn test_silent_queue_is_gateway_timeout() {
        let h = harness(quick_config());

        let response = h
            .router
            .oneshot(post("/nobody-home", Some(&alice()), "hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()["x-bridge-status"], "empty");
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_binary_reply_is_bad_gateway() {
        let h = harness(BridgeConfig::default());

        let response = h
            .router
            .oneshot(post("/blob", Some(&alice()), "hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()["x-bridge-status"], "non_text_reply");
    }

    #[tokio::test]
    async fn test_legacy_mode_answers_ok_with_empty_body() {
        let mut config = quick_config();
        config.compat.legacy_empty_replies = true;
        let h = harness(config);

        for path in ["/nobody-home", "/blob"] {
            let response = h
                .router
                .clone()
                .oneshot(post(path, Some(&alice()), "hello"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", path);
            assert_eq!(body_text(response).await, "", "{}", path);
        }
    }

    // =============================================================================
    // TIMEOUT OVERRIDE
    // =============================================================================

    #[tokio::test]
    async fn test_timeout_header_shortens_wait() {
        let h = harness(BridgeConfig::default());
        let request = Request::post("/nobody-home")
            .header(header::AUTHORIZATION, alice())
            .header("x-reply-timeout-ms", "100")
            .body(Body::from("hello"))
            .unwrap();

        let started = Instant::now();
        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_timeout_header_clamped_to_maximum() {
        let mut config = quick_config();
        config.timeouts.max_reply = Duration::from_millis(300);
        let h = harness(config);
        let request = Request::post("/nobody-home")
            .header(header::AUTHORIZATION, alice())
            .header("x-reply-timeout-ms", "60000")
            .body(Body::from("hello"))
            .unwrap();

        let started = Instant::now();
        let response = h.router.oneshot(request).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);
    }

    // =============================================================================
    // OPERATIONAL ROUTES
    // =============================================================================

    #[tokio::test]
    async fn test_metrics_after_traffic() {
        let h = harness(BridgeConfig::default());

        h.router
            .clone()
            .oneshot(post("/echo", Some(&alice()), "hello"))
            .await
            .unwrap();
        h.router
            .clone()
            .oneshot(post("/echo", None, "hello"))
            .await
            .unwrap();

        let response = h
            .router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["requests"]["total"], 2);
        assert_eq!(json["requests"]["auth_challenges"], 1);
        assert_eq!(json["outcomes"]["delivered"], 1);
        assert_eq!(json["cache"]["entries"], 1);
        assert_eq!(json["pending"]["pending"], 0);
    }
}
