//! HTTP routes for the auth-gate demo server.
//!
//! Defines the Axum router and application state.

use crate::chain::AuthChain;
use crate::handlers;
use crate::middleware::require_auth;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Verifier chain guarding protected routes.
    pub chain: Arc<AuthChain>,

    /// Prometheus handle rendered by `/metrics`.
    pub metrics_handle: PrometheusHandle,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (public)
/// - `/metrics` - Prometheus scrape endpoint (public)
/// - `/api/v1/me` - Identity echo (behind the verifier chain)
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state.metrics_handle);

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .layer(from_fn_with_state(state.chain, require_auth));

    // Later layers wrap earlier ones: the timeout covers tracing and routing
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
