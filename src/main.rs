//! gatekeeper
//!
//! Puts a per-caller sliding-window rate limit in front of one upstream API.
//!
//! ```text
//!   client ──▶ request id ──▶ trace ──▶ rate limit ──▶ upstream forwarder ──▶ upstream
//!                                           │
//!                                           └──▶ 429 + X-RateLimit-* headers
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use gatekeeper::config::{load_config, ConfigWatcher, GatekeeperConfig};
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::{wait_for_shutdown, Shutdown};
use gatekeeper::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gatekeeper", version)]
#[command(about = "Sliding-window rate limiting gateway", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatekeeperConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatekeeper starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        limit = config.rate_limit.limit,
        window_ms = config.rate_limit.window_ms,
        identity_source = ?config.rate_limit.identity_source,
        upstream = %config.upstream.address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config)?;

    tokio::spawn(async move {
        wait_for_shutdown().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
