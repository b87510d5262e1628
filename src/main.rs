//! balancing-proxy
//!
//! Serves the configured endpoints and dispatches every request through a
//! priority-based load balancer to reverse proxy or redirect nodes.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server (per endpoint, TLS on secure ones)
//!                         │  RequestContext { endpoint, client }
//!                         ▼
//!                     secure upgrade ──▶ 302/308 to https://...
//!                         │
//!                         ▼
//!                     transport policy (HSTS on secure responses)
//!                         │
//!                         ▼
//!                     load balancer ── evaluate nodes, max priority, first on ties
//!                         │
//!             ┌───────────┼───────────────┐
//!             ▼           ▼               ▼
//!       reverse proxy   redirect     nested handler
//!             │
//!             ▼
//!     connection pool ──▶ upstream (connect / read timeouts)
//! ```

use std::path::PathBuf;

use clap::Parser;

use balancing_proxy::config::validation::validate_config;
use balancing_proxy::config::{load_config, ConfigError, ProxyConfig};
use balancing_proxy::lifecycle::{self, signals};
use balancing_proxy::observability::{logging, metrics};
use balancing_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "balancing-proxy", version, about = "Priority-based load balancing reverse proxy")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path),
        None => {
            let config = ProxyConfig::default();
            validate_config(&config)
                .map(|()| config)
                .map_err(ConfigError::Validation)
        }
    };

    let log_level = config
        .as_ref()
        .map(|c| c.observability.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    logging::init_logging(&log_level);

    tracing::info!("balancing-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        endpoints = config.endpoints.len(),
        nodes = config.nodes.len(),
        connect_timeout_secs = config.timeouts.connect_secs,
        read_timeout_secs = config.timeouts.read_secs,
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

    let endpoints = lifecycle::endpoints(&config);
    let handler = lifecycle::build_handler(&config, &endpoints)?;

    let server = HttpServer::new(config.endpoints.clone(), handler);
    tokio::spawn(signals::shutdown_on_signal(server.shutdown()));
    server.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
