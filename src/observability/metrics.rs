//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nexus_requests_total` (counter): responses by method, status
//! - `nexus_request_duration_seconds` (histogram): admission to response
//! - `nexus_active_connections` (gauge): currently supervised connections
//! - `nexus_framing_errors_total` (counter): unframeable input by kind
//!
//! # Design Decisions
//! - Labels are low-cardinality only (no paths, no principals)
//! - The exporter is opt-in; recording without one costs a no-op call

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram};
use http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::http::Method;

pub const REQUESTS_TOTAL: &str = "nexus_requests_total";
pub const REQUEST_DURATION: &str = "nexus_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "nexus_active_connections";
pub const FRAMING_ERRORS: &str = "nexus_framing_errors_total";

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_response(method: Method, status: StatusCode) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.as_str(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

pub fn record_latency(method: Method, started: Instant) {
    histogram!(REQUEST_DURATION, "method" => method.as_str()).record(started.elapsed());
}

pub fn record_framing_error(kind: &'static str) {
    counter!(FRAMING_ERRORS, "kind" => kind).increment(1);
}

pub fn set_active_connections(count: usize) {
    gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}
