//! API key verifier.
//!
//! Accepts a request when the configured header carries one of the accepted
//! keys, compared exactly and case-sensitively as bytes. The request is never
//! enriched.
//!
//! Accepted keys are held only as HMAC-SHA256 tags under a per-process random
//! key. A presented key is checked with `hmac::verify` against every tag, so
//! the comparison time does not depend on where the first differing byte is.

use super::{CredentialHeader, Verifier};
use crate::errors::AuthError;
use async_trait::async_trait;
use axum::http::request::Parts;
use ring::{hmac, rand::SystemRandom};
use std::collections::HashSet;
use tracing::instrument;

pub struct ApiKeyVerifier {
    header: CredentialHeader,
    tag_key: hmac::Key,
    tags: Vec<hmac::Tag>,
}

impl ApiKeyVerifier {
    /// Create a verifier accepting any of `keys`. Duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns error if the system random source cannot produce a tag key.
    pub fn new(
        header: CredentialHeader,
        keys: impl IntoIterator<Item = String>,
    ) -> Result<Self, ring::error::Unspecified> {
        let tag_key = hmac::Key::generate(hmac::HMAC_SHA256, &SystemRandom::new())?;
        let tags: Vec<hmac::Tag> = keys
            .into_iter()
            .collect::<HashSet<String>>()
            .iter()
            .map(|key| hmac::sign(&tag_key, key.as_bytes()))
            .collect();

        tracing::debug!(
            target: "auth_gate.verifier.api_key",
            header = %header.display(),
            key_count = tags.len(),
            "API key verifier created"
        );
        Ok(Self {
            header,
            tag_key,
            tags,
        })
    }

    /// Number of distinct accepted keys.
    pub fn key_count(&self) -> usize {
        self.tags.len()
    }

    /// Membership test that visits every accepted key.
    fn is_accepted(&self, presented: &[u8]) -> bool {
        self.tags.iter().fold(false, |found, tag| {
            hmac::verify(&self.tag_key, presented, tag.as_ref()).is_ok() | found
        })
    }
}

#[async_trait]
impl Verifier for ApiKeyVerifier {
    fn name(&self) -> &'static str {
        "api_key"
    }

    #[instrument(skip_all, name = "auth_gate.verifier.api_key")]
    async fn handle(&self, parts: &mut Parts) -> Result<(), AuthError> {
        let presented = self.header.bytes(&parts.headers)?;

        if self.is_accepted(presented) {
            return Ok(());
        }

        tracing::debug!(target: "auth_gate.verifier.api_key", "API key not accepted");
        Err(AuthError::Unauthorized)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn verifier() -> ApiKeyVerifier {
        ApiKeyVerifier::new(
            CredentialHeader::parse("X-API-Key").unwrap(),
            ["key-one".to_string(), "Key-Two".to_string()],
        )
        .unwrap()
    }

    fn parts_with_key(key: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_accepts_member_key() {
        let mut parts = parts_with_key(Some("key-one"));
        assert!(verifier().handle(&mut parts).await.is_ok());

        let mut parts = parts_with_key(Some("Key-Two"));
        assert!(verifier().handle(&mut parts).await.is_ok());
    }

    #[tokio::test]
    async fn test_accepted_request_is_not_enriched() {
        let mut parts = parts_with_key(Some("key-one"));
        verifier().handle(&mut parts).await.unwrap();
        assert!(parts
            .extensions
            .get::<crate::verifiers::IdentityContext>()
            .is_none());
    }

    #[tokio::test]
    async fn test_rejects_unknown_key() {
        let mut parts = parts_with_key(Some("key-three"));
        let err = verifier().handle(&mut parts).await.unwrap_err();
        assert_eq!(err, AuthError::Unauthorized);
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_membership_is_case_sensitive_and_exact() {
        for candidate in ["KEY-ONE", "key-two", "key-one ", "key-on", "key-one-extra"] {
            let mut parts = parts_with_key(Some(candidate));
            assert_eq!(
                verifier().handle(&mut parts).await.unwrap_err(),
                AuthError::Unauthorized,
                "candidate {candidate:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_header_names_configured_header() {
        let mut parts = parts_with_key(None);
        let err = verifier().handle(&mut parts).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing X-API-Key Header");
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let verifier = ApiKeyVerifier::new(
            CredentialHeader::parse("X-API-Key").unwrap(),
            ["a".to_string(), "a".to_string()],
        )
        .unwrap();
        assert_eq!(verifier.key_count(), 1);
    }

    fn parts_with_raw_key(bytes: &'static [u8]) -> Parts {
        let mut parts = parts_with_key(None);
        parts
            .headers
            .insert("x-api-key", HeaderValue::from_bytes(bytes).unwrap());
        parts
    }

    #[tokio::test]
    async fn test_non_ascii_key_is_unauthorized_not_malformed() {
        let mut parts = parts_with_raw_key(b"caf\xc3\xa9");
        let err = verifier().handle(&mut parts).await.unwrap_err();
        assert_eq!(err, AuthError::Unauthorized);
        assert_eq!(err.to_string(), "Unauthorized");

        let mut parts = parts_with_raw_key(b"\xff\xfe");
        assert_eq!(
            verifier().handle(&mut parts).await.unwrap_err(),
            AuthError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_accepts_non_ascii_member_key_byte_for_byte() {
        let verifier = ApiKeyVerifier::new(
            CredentialHeader::parse("X-API-Key").unwrap(),
            ["caf\u{e9}".to_string()],
        )
        .unwrap();

        let mut parts = parts_with_raw_key(b"caf\xc3\xa9");
        assert!(verifier.handle(&mut parts).await.is_ok());
    }
}
