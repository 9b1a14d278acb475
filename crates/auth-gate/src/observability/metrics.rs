//! Metrics definitions for auth-gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_gate_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `outcome`: 2 values (accepted, rejected)
//! - `status`: HTTP status codes produced by verifiers (a handful)
//! - `verifier`: one value per verifier type
//! - `result`: 3 values (success, error, cancelled)

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record the final chain outcome for one request.
///
/// Metric: `auth_gate_requests_total`
/// Labels: `outcome`, `status`
pub fn record_auth_outcome(accepted: bool, status_code: u16) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    counter!("auth_gate_requests_total",
        "outcome" => outcome,
        "status" => status_code.to_string()
    )
    .increment(1);
}

/// Record a single verifier rejection inside the chain.
///
/// Metric: `auth_gate_verifier_rejections_total`
/// Labels: `verifier`, `status`
pub fn record_verifier_rejection(verifier: &'static str, status_code: u16) {
    counter!("auth_gate_verifier_rejections_total",
        "verifier" => verifier,
        "status" => status_code.to_string()
    )
    .increment(1);
}

/// Record one JWKS network fetch.
///
/// Metric: `auth_gate_jwks_fetch_total`
/// Labels: `result`
pub fn record_jwks_fetch(result: &'static str) {
    counter!("auth_gate_jwks_fetch_total", "result" => result).increment(1);
}
