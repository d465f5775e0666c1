//! Metrics collection and exposition.
//!
//! # Metrics
//! - `h2_connections_total` (counter): accepted connections handed to a handler
//! - `h2_active_connections` (gauge): connections currently open
//! - `h2_connection_errors_total` (counter): rejected or failed connections
//! - `h2_streams_total` (counter): streams served by multiplexers
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_opened() {
    metrics::counter!("h2_connections_total").increment(1);
    metrics::gauge!("h2_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("h2_active_connections").decrement(1.0);
}

pub fn record_connection_error(kind: &'static str) {
    metrics::counter!("h2_connection_errors_total", "kind" => kind).increment(1);
}

pub fn record_stream() {
    metrics::counter!("h2_streams_total").increment(1);
}
