//! Traffic mirror (v1)
//!
//! A transparent HTTP interceptor built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                  TRAFFIC MIRROR                   │
//!  Client Request │  ┌──────────┐   ┌──────────┐   ┌──────────────┐  │
//! ────────────────┼─▶│  server  │──▶│ capture  │──▶│ upstream call│──┼──▶ Upstream
//!                 │  └──────────┘   │ request  │   └──────┬───────┘  │
//!                 │                 └────┬─────┘          │          │
//!                 │                      │ spawn          ▼          │
//!                 │               ┌──────▼──────┐   ┌──────────────┐ │
//! Client Response │               │  delivery   │◀──│   tee body   │◀┼─── Upstream
//! ◀───────────────┼───────────────│    task     │   │ (relay+clip) │ │    Response
//!                 │   handoff     └──────┬──────┘   └──────────────┘ │
//!                 │                      │ POST (timeout)            │
//!                 └──────────────────────┼───────────────────────────┘
//!                                        ▼
//!                                 Tracking endpoint
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use traffic_mirror::config::{load_config, ObservabilityConfig};
use traffic_mirror::lifecycle::signals::spawn_signal_handler;
use traffic_mirror::observability::{logging, metrics};
use traffic_mirror::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "traffic-mirror")]
#[command(about = "Transparent HTTP interceptor mirroring traffic to a tracking endpoint", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("traffic-mirror v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        connect_timeout_secs = config.timeouts.connect_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, &shutdown)?;

    spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
