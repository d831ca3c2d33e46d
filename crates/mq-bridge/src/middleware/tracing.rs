//! Request span middleware.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{info_span, Instrument, Span};

/// Header a caller may set to tie bridge logs to its own request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracing layer that creates a span for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let span = info_span!(
            "bridge_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            request_id = request_id(&req).unwrap_or_default(),
            http.status = tracing::field::Empty,
            bridge.status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;

                let current = Span::current();
                current.record("latency_ms", started.elapsed().as_millis() as u64);
                if let Ok(response) = &result {
                    current.record("http.status", response.status().as_u16());
                    if let Some(status) = response
                        .headers()
                        .get(crate::front::BRIDGE_STATUS_HEADER)
                        .and_then(|v| v.to_str().ok())
                    {
                        current.record("bridge.status", status);
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn request_id<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(REQUEST_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|id| !id.is_empty())
}
