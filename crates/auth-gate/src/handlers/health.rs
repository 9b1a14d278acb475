//! Health check handler.

use axum::Json;
use serde::Serialize;
use tracing::instrument;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Handler for GET /health
///
/// Liveness probe; never authenticated.
#[instrument(skip_all, name = "auth_gate.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
