//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Register the interceptor (fails fast on bad options)
//! - Create the Axum Router with the catch-all intercept route
//! - Wire up middleware (request ID, tracing)
//! - Serve until the shutdown broadcast fires

use axum::{routing::any, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::validation::parse_upstream;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::handler::{intercept, Interceptor};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;

/// HTTP server hosting the interceptor.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Register the interceptor and build the server.
    ///
    /// Returns a configuration error, and installs nothing, when the
    /// upstream address or the interceptor options are invalid.
    pub fn new(config: ProxyConfig, shutdown: &Shutdown) -> Result<Self, ConfigError> {
        let upstream = parse_upstream(&config.upstream.address)?;
        let interceptor = Interceptor::register(
            &config.interceptor,
            upstream,
            Duration::from_secs(config.timeouts.connect_secs),
            shutdown.clone(),
        )?;

        let router = Self::build_router(Arc::new(interceptor));
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(interceptor: Arc<Interceptor>) -> Router {
        Router::new()
            .route("/", any(intercept))
            .route("/{*path}", any(intercept))
            .with_state(interceptor)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
