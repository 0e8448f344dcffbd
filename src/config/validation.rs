//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses (listener, upstream)
//! - Validate interceptor registration options
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::interceptor::InterceptorConfig;
use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `tracking_url` was not provided.
    #[error("tracking_url is required")]
    MissingTrackingUrl,

    /// `tracking_url` is not an absolute http(s) URI.
    #[error("invalid tracking_url '{url}': {reason}")]
    InvalidTrackingUrl { url: String, reason: String },

    /// The listener bind address is not a socket address.
    #[error("invalid listener.bind_address '{0}'")]
    InvalidBindAddress(String),

    /// The upstream address is not a valid `host:port` authority.
    #[error("invalid upstream.address '{0}'")]
    InvalidUpstream(String),
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Err(e) = parse_upstream(&config.upstream.address) {
        errors.push(e);
    }

    if let Err(e) = InterceptorConfig::from_options(&config.interceptor) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse the upstream address into a URI authority.
pub fn parse_upstream(address: &str) -> Result<Authority, ValidationError> {
    match address.parse::<Authority>() {
        Ok(authority) if !authority.host().is_empty() => Ok(authority),
        _ => Err(ValidationError::InvalidUpstream(address.to_string())),
    }
}
