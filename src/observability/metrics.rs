//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): client responses by status, outcome
//! - `proxy_request_duration_seconds` (histogram): session latency
//! - `proxy_cache_outcomes_total` (counter): miss / revalidate / expired
//! - `proxy_origin_fetches_total` (counter): origin round trips by kind, status
//! - `proxy_active_connections` (gauge): current connection count
//!
//! Recording is a no-op until a recorder is installed by [`init_metrics`].

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished client session.
pub fn record_request(status: u16, outcome: &'static str, start: Instant) {
    counter!("proxy_requests_total", "status" => status.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record the freshness decision taken for a key.
pub fn record_cache_outcome(outcome: &'static str) {
    counter!("proxy_cache_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record one origin round trip.
pub fn record_origin_fetch(kind: &'static str, status: u16) {
    counter!("proxy_origin_fetches_total", "kind" => kind, "status" => status.to_string())
        .increment(1);
}

/// Publish the current connection count.
pub fn set_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}
