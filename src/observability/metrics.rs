//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency by method, route
//! - `auth_decisions_total` (counter): auth outcomes by variant, outcome
//! - `auth_renewals_total` (counter): access tokens renewed from a refresh cookie
//!
//! # Design Decisions
//! - The route label is the compiled path (`/posts/:id`), never the raw URI
//! - Without an installed recorder the macros are no-ops

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start_time: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}

/// `outcome` is one of `service`, `user`, `renewed`, `rejected`.
pub fn record_auth(variant: &'static str, outcome: &'static str) {
    counter!("auth_decisions_total", "variant" => variant, "outcome" => outcome).increment(1);
}

pub fn record_renewal() {
    counter!("auth_renewals_total").increment(1);
}
