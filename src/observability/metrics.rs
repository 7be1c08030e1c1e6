//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatekeeper_uploads_total` (counter): terminal decisions by outcome, stage
//! - `gatekeeper_upload_bytes` (histogram): observed upload sizes
//! - `gatekeeper_pipeline_duration_seconds` (histogram): time to decision
//! - `gatekeeper_audit_failures_total` (counter): audit records that could not be written
//! - `gatekeeper_http_requests_total` (counter): requests by method, status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one terminal pipeline decision.
pub fn record_decision(outcome: &'static str, stage: &'static str, start: Instant) {
    ::metrics::counter!("gatekeeper_uploads_total", "outcome" => outcome, "stage" => stage).increment(1);
    ::metrics::histogram!("gatekeeper_pipeline_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upload_bytes(bytes: usize) {
    ::metrics::histogram!("gatekeeper_upload_bytes").record(bytes as f64);
}

/// The internal alarm for a lost audit record.
pub fn record_audit_failure() {
    ::metrics::counter!("gatekeeper_audit_failures_total").increment(1);
}

pub fn record_request(method: &str, status: u16) {
    ::metrics::counter!(
        "gatekeeper_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
