//! Metrics collection and exposition.
//!
//! # Metrics
//! - `orchestrator_actions_total` (counter): handled actions by action, outcome
//! - `orchestrator_transactions_submitted_total` (counter): broadcasts by kind
//! - `orchestrator_transactions_finalized_total` (counter): confirmations by kind, status
//! - `orchestrator_active_sessions` (gauge): live wallet sessions
//! - `orchestrator_token_cache_size` (gauge): cached token entries

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_action(action: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!(
        "orchestrator_actions_total",
        "action" => action.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_transaction_submitted(kind: &'static str) {
    metrics::counter!("orchestrator_transactions_submitted_total", "kind" => kind).increment(1);
}

pub fn record_transaction_finalized(kind: &'static str, status: &'static str) {
    metrics::counter!(
        "orchestrator_transactions_finalized_total",
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("orchestrator_active_sessions").set(count as f64);
}

pub fn record_token_cache_size(size: usize) {
    metrics::gauge!("orchestrator_token_cache_size").set(size as f64);
}
