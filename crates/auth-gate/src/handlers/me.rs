//! Identity echo handler.
//!
//! Returns the identity context attached by the verifier chain.

use crate::verifiers::IdentityContext;
use axum::{Extension, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Identity entries by context key. JSON payloads are embedded as
    /// objects, anything else as a string.
    pub identity: BTreeMap<String, serde_json::Value>,
}

impl MeResponse {
    pub fn from_context(context: &IdentityContext) -> Self {
        let identity = context
            .iter()
            .map(|(key, payload)| {
                let value = serde_json::from_str(payload)
                    .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));
                (key.to_string(), value)
            })
            .collect();
        Self { identity }
    }
}

/// Handler for GET /api/v1/me
///
/// ## Response
///
/// ```json
/// {
///   "identity": {
///     "USER": { "sub": "alice", "exp": 1234567890 }
///   }
/// }
/// ```
///
/// An API key match attaches nothing, so `identity` is empty in that case.
#[instrument(skip_all, name = "auth_gate.handlers.me")]
pub async fn get_me(context: Option<Extension<IdentityContext>>) -> Json<MeResponse> {
    let context = context.map(|Extension(ctx)| ctx).unwrap_or_default();
    tracing::debug!(target: "auth_gate.handlers.me", entries = context.iter().count(), "Returning identity");
    Json(MeResponse::from_context(&context))
}
