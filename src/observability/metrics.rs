//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (requests, latency, upstream errors, selections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by method, status, upstream
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_upstream_errors_total` (counter): upstream failures by kind
//! - `balancer_selections_total` (counter): selections by node
//! - `secure_upgrade_redirects_total` (counter): redirects by mode
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels for upstream, node and status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a forwarded request.
pub fn record_request(method: &str, status: u16, upstream: &str, start: Instant) {
    let labels = vec![
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("upstream", upstream.to_string()),
    ];
    ::metrics::counter!("proxy_requests_total", &labels).increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a failed upstream exchange.
pub fn record_upstream_error(upstream: &str, kind: &'static str) {
    ::metrics::counter!(
        "proxy_upstream_errors_total",
        "upstream" => upstream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record the node chosen by a load balancer.
pub fn record_selection(node: &str) {
    ::metrics::counter!("balancer_selections_total", "node" => node.to_string()).increment(1);
}

/// Record a secure-upgrade redirect.
pub fn record_upgrade_redirect(mode: &'static str) {
    ::metrics::counter!("secure_upgrade_redirects_total", "mode" => mode).increment(1);
}
