//! MPD HTTP gateway.
//!
//! Serves a small web UI and a JSON API that translate HTTP calls into MPD
//! protocol commands.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser / CLI
//!          │
//!          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │  http (axum)                                 │
//!   │    request ID → trace → panic guard →        │
//!   │    timeout → metrics → handler               │
//!   │                                              │
//!   │  handler: params → rate limit → retry wrapper│
//!   └──────────────────────┬───────────────────────┘
//!                          │ one connection per request
//!                          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │  net::ConnectionManager → mpd::MpdConnection │
//!   └──────────────────────┬───────────────────────┘
//!                          ▼
//!                     MPD server
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use mpd_gateway::config::{self, GatewayConfig};
use mpd_gateway::lifecycle::signals::wait_for_signal;
use mpd_gateway::observability::{logging, metrics};
use mpd_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "mpd-gateway")]
#[command(about = "HTTP gateway for a Music Player Daemon", version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file and MPD_GATEWAY_BIND
    #[arg(short, long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<GatewayConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::read_config(path)?,
        None => GatewayConfig::default(),
    };

    config::apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }

    config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("mpd-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = ?config.backend,
        max_attempts = config.retries.max_attempts,
        request_timeout_secs = config.timeouts.request_secs,
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

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    GatewayServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
