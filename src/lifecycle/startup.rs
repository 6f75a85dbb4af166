//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare the cache root directory
//! - Bind the listener last, once everything else is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal

use std::path::PathBuf;

use crate::config::ProxyConfig;
use crate::net::{Listener, ListenerError};

/// Create the cache root if needed and return its path.
pub async fn prepare_cache_root(config: &ProxyConfig) -> std::io::Result<PathBuf> {
    let root = PathBuf::from(&config.cache.root_dir);
    tokio::fs::create_dir_all(&root).await?;
    tracing::info!(
        root = %root.display(),
        expire_secs = config.cache.expire_secs,
        "Cache directory ready"
    );
    Ok(root)
}

/// Bind the listener described by `config`.
pub async fn bind_listener(config: &ProxyConfig) -> Result<Listener, ListenerError> {
    Listener::bind(&config.listener).await
}
