//! HTTP traffic-mirroring interceptor.
//!
//! Forwards every request to a single upstream and, off the caller's
//! path, replicates bounded copies of the request and response bodies to
//! a tracking endpoint.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod tracking;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
