//! JWKS-backed JWT verifier.
//!
//! Resolves the verification key from a remote JWK Set through
//! [`KeyProvider`], verifies the token signature, and attaches the raw
//! payload under the identity key.
//!
//! Key lookup failures are gateway errors (502): the token may be fine but
//! this service cannot obtain a key to check it.

use super::{CredentialHeader, IdentityContext, Verifier};
use crate::auth::jwks::{JwksCache, JwksError};
use crate::auth::key_provider::{JwksKeyFetcher, KeyProvider};
use crate::auth::token::{parse_compact, verify_signature};
use crate::errors::AuthError;
use async_trait::async_trait;
use axum::http::request::Parts;
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Settings for one JWKS verifier.
#[derive(Debug, Clone)]
pub struct JwksVerifierConfig {
    pub header: CredentialHeader,
    pub scheme: String,
    pub url: String,
    pub min_refresh_interval: Duration,
    /// Restrict verification to one algorithm.
    pub algorithm: Option<Algorithm>,
    pub payload_key: String,
}

pub struct JwksVerifier {
    header: CredentialHeader,
    scheme: String,
    payload_key: String,
    provider: KeyProvider<JwksKeyFetcher>,
}

impl JwksVerifier {
    /// Register the URL with `cache` and fetch it once.
    ///
    /// # Errors
    ///
    /// Returns the fetch error if the initial key set cannot be loaded.
    pub async fn new(config: JwksVerifierConfig, cache: Arc<JwksCache>) -> Result<Self, JwksError> {
        cache
            .register(&config.url, config.min_refresh_interval)
            .await;

        let snapshot = cache.refresh(&config.url).await.map_err(|e| {
            tracing::error!(
                target: "auth_gate.verifier.jwks",
                url = %config.url,
                error = %e,
                "Initial JWKS fetch failed"
            );
            e
        })?;

        tracing::info!(
            target: "auth_gate.verifier.jwks",
            url = %config.url,
            key_count = snapshot.len(),
            alg = ?config.algorithm,
            payload_key = %config.payload_key,
            "JWKS verifier created"
        );

        Ok(Self {
            header: config.header,
            scheme: config.scheme,
            payload_key: config.payload_key,
            provider: KeyProvider::new(JwksKeyFetcher::new(cache, config.url), config.algorithm),
        })
    }

    pub fn url(&self) -> &str {
        self.provider.fetcher().url()
    }
}

#[async_trait]
impl Verifier for JwksVerifier {
    fn name(&self) -> &'static str {
        "jwks"
    }

    #[instrument(skip_all, name = "auth_gate.verifier.jwks")]
    async fn handle(&self, parts: &mut Parts) -> Result<(), AuthError> {
        let token = self.header.token(&parts.headers, &self.scheme)?;

        let parsed = parse_compact(token).map_err(|e| {
            tracing::debug!(target: "auth_gate.verifier.jwks", error = %e, "Token parse failed");
            AuthError::InvalidToken
        })?;

        let (algorithm, key) = self.provider.resolve(&parsed.header).await.map_err(|e| {
            tracing::warn!(
                target: "auth_gate.verifier.jwks",
                kid = ?parsed.header.kid,
                error = %e,
                "Key resolution failed"
            );
            AuthError::from(e)
        })?;

        let verified = verify_signature(token, algorithm, &key).map_err(|e| {
            tracing::debug!(target: "auth_gate.verifier.jwks", error = %e, "Token verification failed");
            AuthError::InvalidToken
        })?;

        if verified != parsed.payload {
            tracing::warn!(target: "auth_gate.verifier.jwks", "Verified payload differs from parsed payload");
            return Err(AuthError::InvalidToken);
        }

        let payload = String::from_utf8(verified).map_err(|_| AuthError::InvalidToken)?;
        IdentityContext::attach(parts, &self.payload_key, payload);

        tracing::debug!(target: "auth_gate.verifier.jwks", "Token validated successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::DEFAULT_REFRESH_WINDOW;
    use crate::verifiers::IdentityExt;
    use auth_gate_test_utils::crypto_fixtures::{flip_signature_bit, test_ed25519_keypair};
    use auth_gate_test_utils::jwks_server::MockJwksServer;
    use auth_gate_test_utils::token_builders::{hs256_token, TestClaims};
    use axum::http::{Request, StatusCode};
    use tokio_util::sync::CancellationToken;

    fn config(url: String, algorithm: Option<Algorithm>) -> JwksVerifierConfig {
        JwksVerifierConfig {
            header: CredentialHeader::parse("Authorization").unwrap(),
            scheme: "Bearer".to_string(),
            url,
            min_refresh_interval: Duration::from_secs(300),
            algorithm,
            payload_key: "USER".to_string(),
        }
    }

    fn cache() -> Arc<JwksCache> {
        Arc::new(JwksCache::new(DEFAULT_REFRESH_WINDOW, CancellationToken::new()))
    }

    fn bearer(token: &str) -> Parts {
        Request::builder()
            .uri("/")
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn test_construction_fails_when_initial_fetch_fails() {
        let server = MockJwksServer::start_failing(500).await;

        let result = JwksVerifier::new(config(server.url(), None), cache()).await;

        assert_eq!(result.err(), Some(JwksError::Status(500)));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_payload() {
        let keypair = test_ed25519_keypair(1, "key-1");
        let server = MockJwksServer::start(&[keypair.jwk_json()]).await;
        let verifier = JwksVerifier::new(config(server.url(), None), cache())
            .await
            .unwrap();

        let mut parts = bearer(&keypair.sign_token(&TestClaims::valid("alice")));
        verifier.handle(&mut parts).await.unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(parts.identity("USER").unwrap()).unwrap();
        assert_eq!(payload["sub"], "alice");
    }

    #[tokio::test]
    async fn test_flipped_signature_bit_is_rejected() {
        let keypair = test_ed25519_keypair(1, "key-1");
        let server = MockJwksServer::start(&[keypair.jwk_json()]).await;
        let verifier = JwksVerifier::new(config(server.url(), None), cache())
            .await
            .unwrap();

        let token = flip_signature_bit(&keypair.sign_token(&TestClaims::valid("alice")));
        let mut parts = bearer(&token);
        let err = verifier.handle(&mut parts).await.unwrap_err();

        assert_eq!(err, AuthError::InvalidToken);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(parts.identity("USER").is_none());
    }

    #[tokio::test]
    async fn test_unknown_kid_is_no_matching_key() {
        let published = test_ed25519_keypair(1, "key-1");
        let unpublished = test_ed25519_keypair(2, "key-2");
        let server = MockJwksServer::start(&[published.jwk_json()]).await;
        let verifier = JwksVerifier::new(config(server.url(), Some(Algorithm::EdDSA)), cache())
            .await
            .unwrap();

        let mut parts = bearer(&unpublished.sign_token(&TestClaims::valid("alice")));
        let err = verifier.handle(&mut parts).await.unwrap_err();

        assert_eq!(err.to_string(), "No valid JWK found for algorithm EdDSA");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_token_without_kid_uses_first_matching_key() {
        let keypair = test_ed25519_keypair(1, "key-1");
        let other = test_ed25519_keypair(2, "key-2");
        let server = MockJwksServer::start(&[keypair.jwk_json(), other.jwk_json()]).await;
        let verifier = JwksVerifier::new(config(server.url(), None), cache())
            .await
            .unwrap();

        let token = keypair.sign_token_with_kid(&TestClaims::valid("alice"), None);
        let mut parts = bearer(&token);
        assert!(verifier.handle(&mut parts).await.is_ok());

        let token = other.sign_token_with_kid(&TestClaims::valid("bob"), None);
        let mut parts = bearer(&token);
        assert_eq!(
            verifier.handle(&mut parts).await.unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_hmac_token_against_asymmetric_keys_is_invalid() {
        let keypair = test_ed25519_keypair(1, "key-1");
        let server = MockJwksServer::start(&[keypair.jwk_json()]).await;
        let verifier = JwksVerifier::new(config(server.url(), None), cache())
            .await
            .unwrap();

        let mut parts = bearer(&hs256_token(&TestClaims::valid("alice")));
        let err = verifier.handle(&mut parts).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "No valid JWK found for algorithm HS256");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let keypair = test_ed25519_keypair(1, "key-1");
        let server = MockJwksServer::start(&[keypair.jwk_json()]).await;
        let verifier = JwksVerifier::new(config(server.url(), None), cache())
            .await
            .unwrap();

        let mut parts = Request::builder().uri("/").body(()).unwrap().into_parts().0;
        assert_eq!(
            verifier.handle(&mut parts).await.unwrap_err(),
            AuthError::missing("Authorization")
        );
    }
}
