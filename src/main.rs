//! Flores Victoria API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GATEWAY                        │
//!                        │                                                   │
//!   Client Request       │  ┌─────────┐   ┌──────────────┐   ┌────────────┐ │
//!   ─────────────────────┼─▶│  http   │──▶│   service    │──▶│   retry    │ │
//!                        │  │ server  │   │  directory   │   │   policy   │ │
//!                        │  └─────────┘   └──────────────┘   └─────┬──────┘ │
//!                        │                                         ▼        │
//!   Client Response      │  ┌─────────┐   ┌──────────────┐   ┌────────────┐ │
//!   ◀────────────────────┼──│response │◀──│   service    │◀──│  circuit   │◀┼── Upstream
//!                        │  │ mapping │   │   client     │   │  breaker   │ │   service
//!                        │  └─────────┘   └──────────────┘   └────────────┘ │
//!                        │                                                   │
//!                        │  config (hot reload) · observability · admin     │
//!                        └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use flores_resilience::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use flores_resilience::http::HttpServer;
use flores_resilience::lifecycle::{signals, Shutdown};
use flores_resilience::observability::{logging, metrics};

/// Config file used when `--config` is not given.
const CONFIG_ENV: &str = "GATEWAY_CONFIG";

#[derive(Parser)]
#[command(name = "flores-gateway")]
#[command(about = "API gateway with per-service circuit breakers", long_about = None)]
struct Args {
    /// Path to the TOML config file. Falls back to $GATEWAY_CONFIG, then defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "flores-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        config = ?config_path,
        services = config.services.len(),
        failure_threshold = config.breaker.failure_threshold,
        reset_timeout_ms = config.breaker.reset_timeout_ms,
        call_timeout_ms = config.breaker.call_timeout_ms,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher must stay alive for as long as the server runs.
    let (_watcher, config_updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_on_signal(&signal_shutdown).await;
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
