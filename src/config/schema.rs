//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::policy::DEFAULT_EXPIRE_SECS;

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Cache directory and freshness window.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Origin connect retry configuration.
    pub retries: RetryConfig,

    /// Local error pages.
    pub error_pages: ErrorPagesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 1024,
        }
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `<host>_<port>/...` entries.
    pub root_dir: String,

    /// Freshness window in seconds.
    pub expire_secs: u64,

    /// Chunk size for body transfers in bytes.
    pub buffer_size: usize,
}

impl CacheConfig {
    pub fn expire_after(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: "cache".to_string(),
            expire_secs: DEFAULT_EXPIRE_SECS,
            buffer_size: 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Origin connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Origin response head and body transfer timeout in seconds.
    pub read_secs: u64,

    /// Time a client gets to send its request head, in seconds.
    pub client_idle_secs: u64,

    /// Time a client gets to take delivery of a response, in seconds.
    pub client_write_secs: u64,

    /// Grace period for in-flight sessions at shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            read_secs: 30,
            client_idle_secs: 30,
            client_write_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Retry configuration for origin connects.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of connect attempts, first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Attempts actually made, honoring `enabled`.
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 2,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

/// Error page lookup.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ErrorPagesConfig {
    /// Directory containing `<code>.html` files. Built-in pages when unset.
    pub dir: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.cache.expire_secs, 120);
        assert_eq!(config.cache.buffer_size, 1024);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.error_pages.dir.is_none());
    }

    #[test]
    fn partial_sections_fill_in() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [cache]
            root_dir = "/var/cache/proxy"

            [retries]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.root_dir, "/var/cache/proxy");
        assert_eq!(config.cache.expire_secs, 120);
        assert_eq!(config.retries.attempts(), 1);
    }
}
