//! Bridge service: one inbound request in, one reply outcome out.

use crate::cache::ResourceCache;
use crate::domain::{BridgeError, BridgeRequest, BridgeResponse, BridgeResult, ReplyOutcome};
use crate::gateway::BridgeGateway;
use crate::middleware::{BridgeMetrics, RequestTimer};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Ties the resource cache and the gateway together for the transport.
#[derive(Clone)]
pub struct BridgeService {
    cache: Arc<ResourceCache>,
    gateway: Arc<BridgeGateway>,
    metrics: Arc<BridgeMetrics>,
}

impl BridgeService {
    pub fn new(
        cache: Arc<ResourceCache>,
        gateway: Arc<BridgeGateway>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            cache,
            gateway,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn gateway(&self) -> &Arc<BridgeGateway> {
        &self.gateway
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Forward `request` and wait for its reply.
    ///
    /// Connection problems are errors; everything that happens after the
    /// resources are in hand is a [`ReplyOutcome`] in the response.
    pub async fn forward(&self, request: BridgeRequest) -> BridgeResult<BridgeResponse> {
        let BridgeRequest {
            destination,
            payload,
            credential,
            timeout,
        } = request;

        if destination.trim().is_empty() {
            self.metrics.record_invalid_destination();
            return Err(BridgeError::InvalidDestination(destination));
        }

        // Held until the reply is in, so eviction cannot close the session
        // under the wait
        let lease = match self.cache.lease(&credential).await {
            Ok(lease) => lease,
            Err(e) => {
                self.metrics.record_connection_error();
                error!(
                    credential = credential.identity(),
                    destination = %destination,
                    error = %e,
                    "Could not obtain broker resources"
                );
                return Err(e.into());
            }
        };

        debug!(
            credential = credential.identity(),
            destination = %destination,
            timeout_ms = timeout.as_millis() as u64,
            "Forwarding request"
        );

        let timer = RequestTimer::new(self.metrics.clone());
        let outcome = self
            .gateway
            .send_and_await_reply(&destination, &payload, lease.handle(), lease.channel(), timeout)
            .await;
        timer.finish(outcome.status());

        let handle = lease.handle().clone();
        drop(lease);
        if let ReplyOutcome::BrokerError(reason) = &outcome {
            if !handle.is_open() {
                warn!(
                    credential = credential.identity(),
                    error = %reason,
                    "Broker session lost, dropping cached resources"
                );
                self.cache.invalidate_session(&credential, &handle).await;
            }
        }

        debug!(
            credential = credential.identity(),
            destination = %destination,
            status = outcome.status().as_str(),
            "Request finished"
        );
        Ok(outcome.into_response())
    }
}
