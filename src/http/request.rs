//! Request handling and transformation.
//!
//! # Responsibilities
//! - Correlate every request with an `x-request-id` (UUID v4 when absent)
//! - Rewrite the inbound URI onto the configured upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Path and raw query are preserved byte for byte

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderMap, Uri};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::ProxyError;

/// Correlation header shared by caller, upstream and logs.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning a UUID v4 request id when the caller sent none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request id onto the caller response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Read the request id, falling back to "unknown".
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Point `uri` at `upstream` over plain HTTP, keeping path and query.
pub fn upstream_uri(uri: &Uri, upstream: &Authority) -> Result<Uri, ProxyError> {
    let path_and_query = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(upstream.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(ProxyError::Uri)
}
