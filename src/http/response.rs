//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map caller-path failures to HTTP status codes
//!
//! # Design Decisions
//! - Upstream failures become 502 Bad Gateway with the error text as body
//! - Delivery failures never reach this module

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::error::Error as StdError;
use thiserror::Error;

use crate::capture::CaptureError;

/// Failures on the caller-facing path.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The forwarded call failed before any response was received.
    #[error("{}", error_chain(.0))]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The inbound body could not be read.
    #[error(transparent)]
    RequestBody(#[from] CaptureError),

    /// The upstream URI could not be built.
    #[error("invalid upstream uri: {0}")]
    Uri(#[source] axum::http::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::Uri(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Render an error followed by its sources, separated by ": ".
fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
