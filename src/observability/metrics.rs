//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reqfile_requests_total` (counter): executed requests by method, status
//! - `reqfile_request_duration_seconds` (histogram): resolve + execute time
//! - `reqfile_request_failures_total` (counter): aborted requests by error kind
//! - `reqfile_invalid_records_total` (counter): records with unknown methods
//!
//! Recording is a no-op until a recorder is installed, so the engine can
//! always record and the exporter stays optional.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "reqfile_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("reqfile_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request aborted by an engine error.
pub fn record_failure(kind: &'static str) {
    metrics::counter!("reqfile_request_failures_total", "kind" => kind).increment(1);
}

/// Record a record skipped because its method is not executable.
pub fn record_invalid() {
    metrics::counter!("reqfile_invalid_records_total").increment(1);
}
