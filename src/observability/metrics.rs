//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waf_detect_requests_total` (counter): detections by outcome
//! - `waf_detect_duration_seconds` (histogram): round-trip latency
//! - `waf_health_checks_total` (counter): health checks by outcome
//! - `waf_connection_dials_total` (counter): factory dials by outcome
//!
//! Recording is a no-op until a recorder is installed, so the library can
//! record unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one detection outcome ("pass", "block", or an error kind).
pub fn record_detect(outcome: &'static str, start: Instant) {
    counter!("waf_detect_requests_total", "outcome" => outcome).increment(1);
    histogram!("waf_detect_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one health-check outcome.
pub fn record_health_check(healthy: bool) {
    let outcome = if healthy { "healthy" } else { "unhealthy" };
    counter!("waf_health_checks_total", "outcome" => outcome).increment(1);
}

/// Record one connection factory dial.
pub fn record_dial(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("waf_connection_dials_total", "outcome" => outcome).increment(1);
}
