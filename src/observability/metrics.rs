//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_envelopes_forwarded_total` (counter): envelopes moved, by direction
//! - `bridge_envelopes_dropped_total` (counter): page events discarded, by reason
//! - `bridge_reconnects_total` (counter): port reconnect attempts
//! - `bridge_health_checks_total` (counter): health checks posted
//! - `bridge_responses_total` (counter): host responses, by outcome
//! - `bridge_pending_decisions` (gauge): requests awaiting a user decision

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Direction label for forwarded envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    PageToHost,
    HostToPage,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::PageToHost => "page_to_host",
            Direction::HostToPage => "host_to_page",
        }
    }
}

pub fn record_forwarded(direction: Direction) {
    metrics::counter!("bridge_envelopes_forwarded_total", "direction" => direction.as_str())
        .increment(1);
}

pub fn record_dropped(reason: &'static str) {
    metrics::counter!("bridge_envelopes_dropped_total", "reason" => reason).increment(1);
}

pub fn record_reconnect() {
    metrics::counter!("bridge_reconnects_total").increment(1);
}

pub fn record_health_check() {
    metrics::counter!("bridge_health_checks_total").increment(1);
}

pub fn record_response(outcome: &'static str) {
    metrics::counter!("bridge_responses_total", "outcome" => outcome).increment(1);
}

pub fn set_pending(count: usize) {
    metrics::gauge!("bridge_pending_decisions").set(count as f64);
}
