//! HTTP handlers.

use super::auth::{challenge, credential_from_headers};
use super::payload::reassemble;
use super::{BRIDGE_STATUS_HEADER, REPLY_TIMEOUT_HEADER};
use crate::bridge::BridgeService;
use crate::domain::{BridgeConfig, BridgeError, BridgeRequest, BridgeResponse, ReplyStatus};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: BridgeService,
    pub config: Arc<BridgeConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: BridgeService, config: Arc<BridgeConfig>) -> Self {
        Self {
            service,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Forward any request under the base path to the queue it names.
pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::GET && method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let config = &state.config;
    let credential = match credential_from_headers(&headers) {
        Ok(credential) => credential,
        Err(e) => {
            state.service.metrics().record_auth_challenge();
            debug!(error = %e, "Challenging request");
            return challenge(&config.http.realm);
        }
    };

    let Some(destination) = destination_of(uri.path(), &config.http.base_path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let request = BridgeRequest {
        destination: destination.to_string(),
        payload: reassemble(&body, config.compat.strip_newlines),
        credential,
        timeout: config.effective_timeout(requested_timeout(&headers)),
    };

    match state.service.forward(request).await {
        Ok(response) => render(response, config.compat.legacy_empty_replies),
        Err(e) => render_error(e, &config.http.realm),
    }
}

/// Liveness and version.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "reply_matching": state.config.broker.reply_matching,
    }))
}

/// Counters as JSON.
pub async fn metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    let service = &state.service;
    let mut body = service.metrics().to_json();
    body["cache"] = serde_json::json!(service.cache().snapshot());
    body["pending"] = serde_json::json!(service.gateway().pending().snapshot());
    body["listeners"] = serde_json::json!(service.gateway().active_listeners());
    Json(body)
}

/// Destination named by `path` under `base_path`.
///
/// `None` when the path is outside the base path. The destination is the
/// raw remainder after the separating slash and may be empty.
pub fn destination_of<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(base_path)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('/')
}

/// Reply timeout requested through [`REPLY_TIMEOUT_HEADER`], if well-formed.
pub fn requested_timeout(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(REPLY_TIMEOUT_HEADER)?.to_str().ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            debug!(value = raw, "Ignoring malformed reply timeout header");
            None
        }
    }
}

/// HTTP status for an outcome.
pub fn status_code(status: ReplyStatus, legacy_empty_replies: bool) -> StatusCode {
    match status {
        ReplyStatus::Delivered => StatusCode::OK,
        _ if legacy_empty_replies => StatusCode::OK,
        ReplyStatus::Empty => StatusCode::GATEWAY_TIMEOUT,
        ReplyStatus::NonTextReply | ReplyStatus::BrokerError => StatusCode::BAD_GATEWAY,
    }
}

fn render(response: BridgeResponse, legacy_empty_replies: bool) -> Response {
    (
        status_code(response.status, legacy_empty_replies),
        [
            (header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8"),
            (BRIDGE_STATUS_HEADER, response.status.as_str()),
        ],
        response.body,
    )
        .into_response()
}

fn render_error(error: BridgeError, realm: &str) -> Response {
    match error {
        BridgeError::Auth(_) => challenge(realm),
        BridgeError::InvalidDestination(_) => {
            (StatusCode::BAD_REQUEST, "missing destination").into_response()
        }
        // Details are in the logs only.
        BridgeError::Connection(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "broker connection failed").into_response()
        }
    }
}
