//! # Responder
//!
//! A background consumer that answers request messages. It is the service
//! side of the request/reply pattern: take a request from a queue, compute a
//! body, and send it to the request's `reply_to` with the request's
//! correlation token.

use crate::broker::Connection;
use crate::message::{Message, MessageBody};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a single receive waits before the loop checks again.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handler invoked for each request. Returning `None` sends no reply.
pub type Handler = dyn Fn(&Message) -> Option<MessageBody> + Send + Sync;

/// Handle to a running responder. Dropping it stops the responder.
pub struct Responder {
    queue: String,
    task: JoinHandle<()>,
}

impl Responder {
    /// Start answering requests arriving on `queue`.
    pub fn spawn<F>(connection: Arc<Connection>, queue: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Message) -> Option<MessageBody> + Send + Sync + 'static,
    {
        let queue = queue.into();
        let handler: Arc<Handler> = Arc::new(handler);
        let task = tokio::spawn(run(connection, queue.clone(), handler));
        info!(queue = %queue, "Responder started");
        Self { queue, task }
    }

    /// Queue this responder consumes.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Whether the consume loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop consuming.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(connection: Arc<Connection>, queue: String, handler: Arc<Handler>) {
    loop {
        let request = match connection.receive(&queue, POLL_INTERVAL).await {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) if e.is_connection_lost() => {
                info!(queue = %queue, "Responder connection closed, stopping");
                break;
            }
            Err(e) => {
                warn!(queue = %queue, error = %e, "Responder receive failed, stopping");
                break;
            }
        };

        let Some(reply_to) = request.reply_to.as_deref() else {
            debug!(queue = %queue, message = %request.id, "Request has no reply_to, skipping");
            continue;
        };

        let Some(body) = handler(&request) else {
            debug!(queue = %queue, message = %request.id, "Handler produced no reply");
            continue;
        };

        if let Err(e) = connection.send(reply_to, request.reply(body)) {
            warn!(
                queue = %queue,
                reply_to = reply_to,
                error = %e,
                "Failed to send reply"
            );
        }
    }
}

/// Handler that answers with the request body unchanged.
#[must_use]
pub fn echo(request: &Message) -> Option<MessageBody> {
    Some(request.body.clone())
}
