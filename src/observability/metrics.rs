//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_provider_requests_total` (counter): wallet provider requests by method, outcome
//! - `ledger_transfers_total` (counter): submitted transfers by outcome
//! - `ledger_history_size` (gauge): records in the last fetched history
//! - `ledger_rpc_health` (gauge): 1=reachable, 0=unreachable
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of a wallet provider request.
pub fn record_provider_request(method: &'static str, outcome: &'static str) {
    metrics::counter!("ledger_provider_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
}

/// Record the outcome of a transfer submission.
pub fn record_transfer(outcome: &'static str) {
    metrics::counter!("ledger_transfers_total", "outcome" => outcome).increment(1);
}

/// Record the size of the last fetched transaction history.
pub fn record_history_size(size: usize) {
    metrics::gauge!("ledger_history_size").set(size as f64);
}

/// Record JSON-RPC reachability.
pub fn record_rpc_health(healthy: bool) {
    metrics::gauge!("ledger_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}
