//! Metrics collection and exposition.
//!
//! # Metrics
//! - `asset_proxy_dispatch_total` (counter): dispatch decisions by outcome
//! - `asset_proxy_rule_cache_total` (counter): rule cache lookups by hit/miss
//! - `asset_proxy_rule_cache_entries` (gauge): cached rule sets
//! - `asset_proxy_forward_total` (counter): forwarded requests by status
//! - `asset_proxy_forward_duration_seconds` (histogram): upstream latency
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_dispatch(outcome: &'static str) {
    counter!("asset_proxy_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn record_rule_cache(result: &'static str) {
    counter!("asset_proxy_rule_cache_total", "result" => result).increment(1);
}

pub fn record_rule_cache_size(entries: usize) {
    gauge!("asset_proxy_rule_cache_entries").set(entries as f64);
}

pub fn record_forward(status: u16, start: Instant) {
    counter!("asset_proxy_forward_total", "status" => status.to_string()).increment(1);
    histogram!("asset_proxy_forward_duration_seconds").record(start.elapsed().as_secs_f64());
}
