//! caching-proxy
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::server ──▶ proxy::session ──┬──▶ cache::store
//!                                                                     └──▶ proxy::origin ──▶ Origin
//! ```
//!
//! Startup order: config, logging, metrics, cache root, listener, server.

use std::path::PathBuf;

use clap::Parser;

use caching_proxy::config::{apply_overrides, load_config, ConfigOverrides, ProxyConfig};
use caching_proxy::lifecycle::{signals, startup, Shutdown};
use caching_proxy::observability::{logging, metrics};
use caching_proxy::ProxyServer;

#[derive(Debug, Parser)]
#[command(name = "caching-proxy", version, about = "Filesystem-backed HTTP caching proxy")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(long)]
    bind: Option<String>,

    /// Override cache.root_dir.
    #[arg(long)]
    cache_dir: Option<String>,

    /// Override observability.log_level.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind.clone(),
            cache_dir: self.cache_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    let config = apply_overrides(config, cli.overrides())?;

    logging::init_logging(&config.observability)?;
    tracing::info!("caching-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        expire_secs = config.cache.expire_secs,
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

    startup::prepare_cache_root(&config).await?;
    let listener = startup::bind_listener(&config).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = ProxyServer::new(&config);
    server.run(listener, shutdown.subscribe()).await;

    tracing::info!("caching-proxy stopped");
    Ok(())
}
