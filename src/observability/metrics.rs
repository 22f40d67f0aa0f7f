//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_handshakes_total` (counter): handshakes by protocol, outcome
//! - `bridge_handoffs_total` (counter): hand-offs by protocol, result
//! - `bridge_registrations` (gauge): installed upgrade handlers per listener
//!
//! # Design Decisions
//! - Outcome labels are static strings so cardinality stays bounded
//! - The exporter is optional; recording without one is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one handshake decision.
pub fn record_handshake(protocol: &str, outcome: &'static str) {
    metrics::counter!(
        "bridge_handshakes_total",
        "protocol" => protocol.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Count one post-upgrade hand-off result.
pub fn record_handoff(protocol: &str, result: &'static str) {
    metrics::counter!(
        "bridge_handoffs_total",
        "protocol" => protocol.to_string(),
        "result" => result
    )
    .increment(1);
}

/// Track installed registrations for a listener.
pub fn adjust_registrations(listener: &str, delta: f64) {
    let gauge = metrics::gauge!("bridge_registrations", "listener" => listener.to_string());
    if delta >= 0.0 {
        gauge.increment(delta);
    } else {
        gauge.decrement(-delta);
    }
}
