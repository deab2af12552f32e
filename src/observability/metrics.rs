//! Metrics collection and exposition.
//!
//! # Metrics
//! - `scs_requests_total` (counter): requests by status code
//! - `scs_request_duration_seconds` (histogram): latency distribution
//! - `scs_auth_decisions_total` (counter): access control outcomes
//! - `scs_secrets_served_total` (counter): secrets handed out
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Installs the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("scs_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("scs_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_auth_decision(outcome: &'static str) {
    metrics::counter!("scs_auth_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_secrets_served(count: usize) {
    if count > 0 {
        metrics::counter!("scs_secrets_served_total").increment(count as u64);
    }
}
