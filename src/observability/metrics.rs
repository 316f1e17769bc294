//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_decisions_total` (counter): limiter outcomes by `outcome`
//! - `gatekeeper_tracked_identities` (gauge): identities holding a window
//! - `gatekeeper_evictions_total` (counter): dropped windows by `reason`
//! - `gatekeeper_requests_total` (counter): requests by method, status
//! - `gatekeeper_request_duration_seconds` (histogram): latency distribution
//! - `gatekeeper_upstream_errors_total` (counter): upstream failures by `kind`
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(admitted: bool) {
    let outcome = if admitted { "admitted" } else { "rejected" };
    counter!("gatekeeper_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_tracked_identities(count: usize) {
    gauge!("gatekeeper_tracked_identities").set(count as f64);
}

pub fn record_evictions(reason: &'static str, count: usize) {
    counter!("gatekeeper_evictions_total", "reason" => reason).increment(count as u64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gatekeeper_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gatekeeper_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("gatekeeper_upstream_errors_total", "kind" => kind).increment(1);
}
