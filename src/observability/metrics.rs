//! Metrics collection and exposition.
//!
//! # Metrics
//! - `inventory_requests_total` (counter): requests by route, method, status
//! - `inventory_request_duration_seconds` (histogram): latency by route
//! - `inventory_migrations_applied_total` (counter): steps applied by this process

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Route label used when nothing matched.
pub const NO_ROUTE: &str = "none";

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let route = route.to_string();
    metrics::counter!(
        "inventory_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.clone()
    )
    .increment(1);
    metrics::histogram!("inventory_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_migrations(applied: usize) {
    metrics::counter!("inventory_migrations_applied_total").increment(applied as u64);
}
