//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status; methods
//!   outside the standard set share the `other` label
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_forward_failures_total` (counter): failures by kind
//! - `proxy_origin_handlers` (gauge): cached forwarding handlers
//!
//! Without an installed recorder every call is a no-op, so the dispatcher can
//! record unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed client request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method_label(method),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Method label with bounded cardinality.
pub fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "other",
    }
}

/// Record a forwarding failure.
pub fn record_forward_failure(kind: &'static str) {
    metrics::counter!("proxy_forward_failures_total", "kind" => kind).increment(1);
}

/// Record the current handler registry size.
pub fn record_handler_count(count: usize) {
    metrics::gauge!("proxy_origin_handlers").set(count as f64);
}
