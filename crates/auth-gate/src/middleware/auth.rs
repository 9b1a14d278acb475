//! Authentication middleware for protected routes.
//!
//! Runs the [`AuthChain`] against every request. Accepted requests continue
//! to the next handler carrying the identity context; rejected requests are
//! answered with the chain's error and never reach the handler.

use crate::chain::AuthChain;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware, installed with
/// `axum::middleware::from_fn_with_state(chain, require_auth)`.
///
/// # Response
///
/// - On rejection: the recorded status with
///   `Content-Type: application/json` and `{"error": "<message>"}`
/// - On acceptance: whatever the next handler returns
#[instrument(skip_all, name = "auth_gate.middleware.auth")]
pub async fn require_auth(
    State(chain): State<Arc<AuthChain>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let req = chain.authenticate(req).await?;
    Ok(next.run(req).await)
}
