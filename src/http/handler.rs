//! The intercepting request handler.
//!
//! Per request, strictly in this order:
//!
//! ```text
//! capture request body (clip, replay whole)
//!     → dispatch delivery task (waits on handoff)
//!     → forward to upstream ──error──→ 502, handoff dropped, task abandoned
//!     → status + headers to caller
//!     → body relayed through TeeBody (prefix captured)
//!     → end of stream: handoff captured response, log completion
//! ```
//!
//! The caller never waits on the delivery task.

use axum::body::Body;
use axum::extract::State;
use axum::http::uri::Authority;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::{capture_body, BoundedCapture, BufferPool, CapturedRequest, TeeBody};
use crate::config::{ConfigError, InterceptorConfig};
use crate::http::request::{request_id, upstream_uri};
use crate::http::response::ProxyError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::tracking::{RequestSnapshot, TrackingDispatcher};

/// Scratch capacity of payload buffers before they grow.
const PAYLOAD_BUFFER_SIZE: usize = 4 * 1024;

/// Starting capacity of response capture buffers. Larger captures grow the
/// buffer as bytes arrive, up to the configured limit.
const CAPTURE_BUFFER_SIZE: usize = 64 * 1024;

/// A registered interceptor: configuration plus the resources its requests share.
pub struct Interceptor {
    config: Arc<InterceptorConfig>,
    upstream: Authority,
    client: Client<HttpConnector, Body>,
    dispatcher: TrackingDispatcher,
    capture_pool: Arc<BufferPool>,
}

impl Interceptor {
    /// Register an interceptor from its raw option map.
    ///
    /// Fails without side effects when the options are invalid.
    pub fn register(
        options: &Map<String, Value>,
        upstream: Authority,
        connect_timeout: Duration,
        shutdown: Shutdown,
    ) -> Result<Self, ConfigError> {
        let config = InterceptorConfig::from_options(options)?;

        tracing::info!(
            plugin = "traffic-mirror",
            tracking_url = %config.tracking_url,
            timeout = ?config.timeout,
            max_capture = config.max_capture,
            verbose = config.verbose,
            upstream = %upstream,
            "Interceptor registered"
        );

        Ok(Self::new(config, upstream, connect_timeout, shutdown))
    }

    /// Build an interceptor from an already validated config.
    pub fn new(
        config: InterceptorConfig,
        upstream: Authority,
        connect_timeout: Duration,
        shutdown: Shutdown,
    ) -> Self {
        let config = Arc::new(config);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let dispatcher = TrackingDispatcher::new(
            Arc::clone(&config),
            Arc::new(BufferPool::new(PAYLOAD_BUFFER_SIZE)),
            shutdown,
        );

        let capture_pool = Arc::new(BufferPool::new(config.max_capture.min(CAPTURE_BUFFER_SIZE)));

        Self {
            capture_pool,
            config,
            upstream,
            client,
            dispatcher,
        }
    }

    /// Forward one request and arrange for it to be mirrored.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let start = Instant::now();
        let (mut parts, body) = request.into_parts();
        let request_id = request_id(&parts.headers);
        let method = parts.method.clone();
        let path = parts.uri.path().to_string();

        let CapturedRequest { captured, replay } =
            capture_body(body, self.config.max_capture).await?;
        metrics::record_captured("request", captured.len());
        if self.config.verbose {
            tracing::debug!(
                plugin = "traffic-mirror",
                request_id = %request_id,
                request_bytes = captured.len(),
                "Request body captured"
            );
        }

        parts.uri = upstream_uri(&parts.uri, &self.upstream)?;

        let (handoff, _delivery) = self.dispatcher.dispatch(RequestSnapshot {
            request_id: request_id.clone(),
            request_body: captured,
            raw_query: parts.uri.query().unwrap_or_default().to_string(),
            url: parts.uri.to_string(),
        });

        let upstream_request = Request::from_parts(parts, Body::new(replay));
        let response = match self.client.request(upstream_request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(
                    plugin = "traffic-mirror",
                    request_id = %request_id,
                    path = %path,
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(method.as_str(), 502, start);
                // Dropping the handoff here abandons the delivery task.
                return Err(ProxyError::Upstream(e));
            }
        };

        let status = response.status();
        let (parts, body) = response.into_parts();
        let capture = BoundedCapture::new(Arc::clone(&self.capture_pool), self.config.max_capture);

        let body = TeeBody::new(body, capture, move |captured: Bytes| {
            metrics::record_captured("response", captured.len());
            handoff.complete(captured);

            tracing::debug!(
                plugin = "traffic-mirror",
                request_id = %request_id,
                path = %path,
                status = status.as_u16(),
                elapsed = ?start.elapsed(),
                "Request completed"
            );
            metrics::record_request(method.as_str(), status.as_u16(), start);
        });

        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Axum entry point for every intercepted route.
pub async fn intercept(State(interceptor): State<Arc<Interceptor>>, request: Request<Body>) -> Response {
    match interceptor.handle(request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
