//! # Dispatch Client
//!
//! Bridges the callback-based [`Invoker`] to `async`/`await`.

use crate::client_trait::Dispatcher;
use crate::error::ClientError;
use crate::invoker::Invoker;
use crate::message::{Request, Response};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// A cheap-to-clone async handle on an [`Invoker`].
///
/// * `dispatch` uses [`Invoker::async_invoke`] and forwards every callback
///   through an unbounded channel until the terminal response arrives.
/// * `dispatch_blocking` runs [`Invoker::sync_invoke`] on tokio's blocking
///   pool so the waiting thread is never an async worker.
#[derive(Clone)]
pub struct DispatchClient {
    invoker: Arc<Invoker>,
    timeout: Option<Duration>,
}

impl DispatchClient {
    pub fn new(invoker: Arc<Invoker>) -> Self {
        Self {
            invoker,
            timeout: None,
        }
    }

    /// Per-call timeout override for async commands.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn invoker(&self) -> &Arc<Invoker> {
        &self.invoker
    }
}

#[async_trait]
impl Dispatcher for DispatchClient {
    async fn dispatch(&self, request: Request) -> Result<Response, ClientError> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        self.invoker.async_invoke(
            request,
            move |response| {
                let _ = sender.send(response);
            },
            self.timeout,
        );
        while let Some(response) = receiver.recv().await {
            if response.status().is_terminal() {
                return Ok(response);
            }
            debug!(status = %response.status(), "Interim response");
        }
        Err(ClientError::Closed)
    }

    async fn dispatch_blocking(&self, request: Request) -> Result<Response, ClientError> {
        let invoker = Arc::clone(&self.invoker);
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || invoker.sync_invoke(&request, timeout))
            .await
            .map_err(|e| ClientError::Join(e.to_string()))
    }
}

impl std::fmt::Debug for DispatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchClient")
            .field("timeout", &self.timeout)
            .finish()
    }
}
