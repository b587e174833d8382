//! Public asset proxy server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────┐
//!   Client Request      │                     ASSET PROXY                      │
//!   ────────────────────┼─▶ subdomain ─▶ proxy rules ─┬─▶ static files         │
//!                       │    mapping      middleware  │   (pass / rewrite)     │
//!                       │                    │        └─▶ forwarder ───────────┼──▶ Backend
//!                       │                    ▼                                 │
//!                       │   parser → resolver → rule cache → matcher           │
//!                       │                    │                                 │
//!                       │                    ▼                                 │
//!                       │              repository (file, hot reload)           │
//!                       └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use asset_proxy::config::{load_config, ProxyConfig};
use asset_proxy::http::{HttpForwarder, HttpServer};
use asset_proxy::lifecycle::{spawn_signal_listener, Shutdown};
use asset_proxy::observability::{logging, metrics};
use asset_proxy::repository::{InMemoryRepository, RepositoryWatcher};

#[derive(Parser)]
#[command(name = "asset-proxy")]
#[command(about = "Proxy rule resolution and forwarding for public assets", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability);
    tracing::info!("asset-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        static_root = ?config.static_files.root,
        rule_cache_ttl_secs = config.rule_cache.ttl_secs,
        subdomain_enabled = config.subdomain.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let repository = Arc::new(match &config.repository.path {
        Some(path) => InMemoryRepository::load_from_file(path)?,
        None => {
            tracing::warn!("No repository file configured; every request passes through");
            InMemoryRepository::default()
        }
    });
    let _watcher = match (&config.repository.path, config.repository.watch) {
        (Some(path), true) => Some(RepositoryWatcher::new(path, repository.clone()).run()?),
        _ => None,
    };

    let forwarder = Arc::new(HttpForwarder::new(&config.forwarding)?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, repository, forwarder);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
