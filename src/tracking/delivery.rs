//! Detached delivery of tracking payloads.
//!
//! # Responsibilities
//! - Spawn one delivery task per intercepted request
//! - Suspend the task until the response capture is handed off
//! - Encode the payload and POST it under its own deadline
//! - Contain every failure inside the task (logged, never surfaced)
//!
//! # Design Decisions
//! - The handoff is a `oneshot` channel; a dropped sender abandons the task
//! - The deadline starts when the task starts encoding, not at request arrival
//! - One attempt only, no retries
//! - The task observes the lifecycle shutdown broadcast while waiting

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::capture::BufferPool;
use crate::config::InterceptorConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::tracking::payload::{self, PayloadEncoder};

/// Why a delivery attempt failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Connection or protocol failure talking to the tracking endpoint.
    #[error("tracking request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The attempt did not finish before its deadline.
    #[error("tracking request timed out after {0:?}")]
    Timeout(Duration),

    /// The tracking endpoint answered with a non-success status.
    #[error("tracking endpoint answered {0}")]
    Status(StatusCode),
}

/// Final state of a delivery task.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The payload was accepted.
    Delivered { bytes: usize, status: StatusCode },
    /// The single attempt failed.
    Failed(DeliveryError),
    /// No attempt was made: the handoff never happened.
    Abandoned,
}

impl DeliveryOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "delivered",
            DeliveryOutcome::Failed(_) => "failed",
            DeliveryOutcome::Abandoned => "abandoned",
        }
    }
}

/// Request-side data captured before the upstream call.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub request_id: String,
    pub request_body: Bytes,
    pub raw_query: String,
    pub url: String,
}

/// Single-use sender half of a delivery task's handoff.
#[derive(Debug)]
pub struct ResponseHandoff {
    tx: oneshot::Sender<Bytes>,
}

impl ResponseHandoff {
    /// Hand the captured response body to the delivery task and close the
    /// channel. A task that already went away is ignored.
    pub fn complete(self, response_body: Bytes) {
        let _ = self.tx.send(response_body);
    }
}

/// Spawns and runs delivery tasks.
#[derive(Clone)]
pub struct TrackingDispatcher {
    client: reqwest::Client,
    config: Arc<InterceptorConfig>,
    encoder: PayloadEncoder,
    shutdown: Shutdown,
}

impl TrackingDispatcher {
    pub fn new(config: Arc<InterceptorConfig>, pool: Arc<BufferPool>, shutdown: Shutdown) -> Self {
        Self {
            client: tracking_client(),
            config,
            encoder: PayloadEncoder::new(pool),
            shutdown,
        }
    }

    /// Start the delivery task for one request.
    ///
    /// The task waits on the returned handoff; nothing is sent until
    /// [`ResponseHandoff::complete`] is called.
    pub fn dispatch(&self, snapshot: RequestSnapshot) -> (ResponseHandoff, JoinHandle<DeliveryOutcome>) {
        let (tx, rx) = oneshot::channel();
        let shutdown = self.shutdown.subscribe();
        let dispatcher = self.clone();

        let handle = tokio::spawn(async move {
            let outcome = dispatcher.run(snapshot, rx, shutdown).await;
            metrics::record_delivery(outcome.label());
            outcome
        });

        (ResponseHandoff { tx }, handle)
    }

    async fn run(
        self,
        snapshot: RequestSnapshot,
        handoff: oneshot::Receiver<Bytes>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> DeliveryOutcome {
        let response_body = tokio::select! {
            received = handoff => match received {
                Ok(body) => body,
                Err(_) => {
                    tracing::debug!(
                        plugin = "traffic-mirror",
                        request_id = %snapshot.request_id,
                        "Response never handed off, skipping delivery"
                    );
                    return DeliveryOutcome::Abandoned;
                }
            },
            _ = shutdown.recv() => {
                tracing::debug!(
                    plugin = "traffic-mirror",
                    request_id = %snapshot.request_id,
                    "Shutdown before handoff, skipping delivery"
                );
                return DeliveryOutcome::Abandoned;
            }
        };

        let outcome = self.deliver(&snapshot, &response_body).await;

        if self.config.verbose {
            match &outcome {
                DeliveryOutcome::Delivered { bytes, status } => tracing::debug!(
                    plugin = "traffic-mirror",
                    request_id = %snapshot.request_id,
                    bytes,
                    status = %status,
                    "POST ok"
                ),
                DeliveryOutcome::Failed(e) => tracing::debug!(
                    plugin = "traffic-mirror",
                    request_id = %snapshot.request_id,
                    error = %e,
                    "POST failed"
                ),
                DeliveryOutcome::Abandoned => {}
            }
        }

        outcome
    }

    /// Encode and send one payload. The deadline covers encoding and the
    /// whole exchange with the tracking endpoint.
    pub async fn deliver(&self, snapshot: &RequestSnapshot, response_body: &[u8]) -> DeliveryOutcome {
        let deadline = Instant::now() + self.config.timeout;

        let payload = self.encoder.encode(
            response_body,
            &snapshot.request_body,
            &snapshot.raw_query,
            &snapshot.url,
        );
        let bytes = payload.len();

        let request = self
            .client
            .post(self.config.tracking_url.clone())
            .header(CONTENT_TYPE, payload::CONTENT_TYPE)
            .body(payload.into_bytes());

        match timeout_at(deadline, request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => DeliveryOutcome::Delivered {
                bytes,
                status: response.status(),
            },
            Ok(Ok(response)) => DeliveryOutcome::Failed(DeliveryError::Status(response.status())),
            Ok(Err(e)) => DeliveryOutcome::Failed(DeliveryError::Transport(e)),
            Err(_) => DeliveryOutcome::Failed(DeliveryError::Timeout(self.config.timeout)),
        }
    }
}

/// Client for the tracking endpoint. Like the upstream client it connects
/// directly and ignores proxy environment variables.
fn tracking_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default tracking client");
            reqwest::Client::new()
        })
}
