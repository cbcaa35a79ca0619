//! Metrics collection and exposition.
//!
//! # Metrics
//! - `binder_requests_total` (counter): requests by route, method, status
//! - `binder_request_duration_seconds` (histogram): time to response head
//! - `binder_route_misses_total` (counter): requests no route matched
//! - `binder_faults_total` (counter): failed requests by route and fault kind
//! - `binder_routes` (gauge): routes in the compiled table
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "binder_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "binder_request_duration_seconds",
        "route" => route.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_route_miss(method: &str) {
    counter!("binder_route_misses_total", "method" => method.to_string()).increment(1);
}

pub fn record_fault(route: &str, kind: &'static str) {
    counter!("binder_faults_total", "route" => route.to_string(), "kind" => kind).increment(1);
}

pub fn set_routes(count: usize) {
    gauge!("binder_routes").set(count as f64);
}
