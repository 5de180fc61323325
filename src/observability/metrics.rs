//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wge_admissions_total` (counter): admission attempts by `outcome`
//! - `wge_admitted_peers` (gauge): size of the admitted set
//! - `wge_peer_writes_total` (counter): peer blocks appended to disk
//! - `wge_service_restarts_total` (counter): restarts by `reason`
//!   (`debounce` or `drain`)

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    metrics::counter!("wge_admissions_total", "outcome" => outcome).increment(1);
}

pub fn record_admitted_peers(count: usize) {
    metrics::gauge!("wge_admitted_peers").set(count as f64);
}

pub fn record_peer_written() {
    metrics::counter!("wge_peer_writes_total").increment(1);
}

pub fn record_service_restart(reason: &'static str) {
    metrics::counter!("wge_service_restarts_total", "reason" => reason).increment(1);
}
