//! Request-path error type.
//!
//! Every verifier failure resolves to an [`AuthError`]. The chain records the
//! error of the last verifier it evaluated and the middleware renders it via
//! the `IntoResponse` impl as `{"error": "<message>"}`.
//!
//! Messages are fixed strings built from configuration (header names,
//! algorithm names). Codec and network details are logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication failure produced by a verifier.
///
/// Maps to HTTP status codes:
/// - MissingCredential, MalformedCredential, Unauthorized, InvalidToken: 401
/// - KeyFetch, NoMatchingKey: 502
/// - Rejected: the carried status
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing {header} Header")]
    MissingCredential { header: String },

    #[error("Invalid {header} Header")]
    MalformedCredential { header: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid JWT token")]
    InvalidToken,

    #[error("Failed to fetch JWKS")]
    KeyFetch,

    #[error("No valid JWK found for algorithm {algorithm}")]
    NoMatchingKey { algorithm: String },

    /// Failure with an explicit status, for verifiers outside this crate.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl AuthError {
    pub fn missing(header: &str) -> Self {
        AuthError::MissingCredential {
            header: header.to_string(),
        }
    }

    pub fn malformed(header: &str) -> Self {
        AuthError::MalformedCredential {
            header: header.to_string(),
        }
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential { .. }
            | AuthError::MalformedCredential { .. }
            | AuthError::Unauthorized
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::KeyFetch | AuthError::NoMatchingKey { .. } => StatusCode::BAD_GATEWAY,
            AuthError::Rejected { status, .. } => *status,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Json sets Content-Type: application/json
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AuthError::missing("X-API-Key").to_string(),
            "Missing X-API-Key Header"
        );
        assert_eq!(
            AuthError::malformed("Authorization").to_string(),
            "Invalid Authorization Header"
        );
        assert_eq!(AuthError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(AuthError::InvalidToken.to_string(), "Invalid JWT token");
        assert_eq!(AuthError::KeyFetch.to_string(), "Failed to fetch JWKS");
        assert_eq!(
            AuthError::NoMatchingKey {
                algorithm: "RS256".to_string()
            }
            .to_string(),
            "No valid JWK found for algorithm RS256"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::missing("h").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::malformed("h").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::KeyFetch.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AuthError::NoMatchingKey {
                algorithm: "EdDSA".to_string()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AuthError::Rejected {
                status: StatusCode::FORBIDDEN,
                message: "nope".to_string()
            }
            .status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_into_response_shape() {
        let response = AuthError::missing("X-API-Key").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json, serde_json::json!({"error": "Missing X-API-Key Header"}));
    }

    #[tokio::test]
    async fn test_into_response_key_fetch() {
        let response = AuthError::KeyFetch.into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "Failed to fetch JWKS");
    }
}
