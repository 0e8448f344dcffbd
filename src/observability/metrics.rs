//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_requests_total` (counter): intercepted requests by method, status
//! - `mirror_request_duration_seconds` (histogram): caller-facing latency
//! - `mirror_deliveries_total` (counter): delivery tasks by outcome
//! - `mirror_captured_bytes` (histogram): captured bytes by side
//!
//! Recording is a no-op until a recorder is installed, so library users
//! and tests pay nothing.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed caller-facing request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "mirror_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mirror_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record the final state of a delivery task.
pub fn record_delivery(outcome: &'static str) {
    metrics::counter!("mirror_deliveries_total", "outcome" => outcome).increment(1);
}

/// Record the size of a capture (`side` is "request" or "response").
pub fn record_captured(side: &'static str, bytes: usize) {
    metrics::histogram!("mirror_captured_bytes", "side" => side).record(bytes as f64);
}
