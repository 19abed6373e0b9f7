//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by forwarding kind and status
//! - `gateway_request_duration_seconds` (histogram): latency by forwarding kind
//! - `gateway_backend_probes_total` (counter): dispatcher probes by outcome
//! - `gateway_bindings_total` (counter): protocol bindings created, by port
//! - `gateway_tunnels_total` (counter): WebSocket tunnels by outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "kind" => kind, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

/// Record one probe connection attempt.
pub fn record_probe(connected: bool) {
    let outcome = if connected { "connected" } else { "refused" };
    counter!("gateway_backend_probes_total", "outcome" => outcome).increment(1);
}

/// Record a newly cached protocol binding.
pub fn record_binding(port: u16) {
    counter!("gateway_bindings_total", "port" => port.to_string()).increment(1);
}

/// Record the outcome of a tunnel setup or teardown.
pub fn record_tunnel(outcome: &'static str) {
    counter!("gateway_tunnels_total", "outcome" => outcome).increment(1);
}
