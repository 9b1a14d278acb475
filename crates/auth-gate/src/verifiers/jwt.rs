//! Static-key JWT verifier.
//!
//! Verifies a compact JWS against one configured algorithm and key, then
//! attaches the raw payload to the request under the identity key.
//!
//! # Security
//!
//! - The header `alg` must equal the configured algorithm
//! - The payload returned by signature verification must equal the parsed
//!   payload byte-for-byte
//! - `exp` / `nbf` are enforced when present
//! - All token failures collapse to a single generic message

use super::{CredentialHeader, IdentityContext, Verifier};
use crate::auth::token::{parse_compact, validate_claims, verify_signature};
use crate::errors::AuthError;
use async_trait::async_trait;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

pub struct JwtVerifier {
    header: CredentialHeader,
    scheme: String,
    algorithm: Algorithm,
    key: DecodingKey,
    payload_key: String,
}

/// Build a decoding key for `algorithm` from configured key material.
///
/// HMAC algorithms use the material as the shared secret; every other family
/// expects a PEM-encoded public key.
pub fn decoding_key_from_material(
    algorithm: Algorithm,
    material: &SecretString,
) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
    let material = material.expose_secret().as_bytes();
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(material))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(material),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(material),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(material),
    }
}

impl JwtVerifier {
    pub fn new(
        header: CredentialHeader,
        scheme: impl Into<String>,
        algorithm: Algorithm,
        key: DecodingKey,
        payload_key: impl Into<String>,
    ) -> Self {
        let verifier = Self {
            header,
            scheme: scheme.into(),
            algorithm,
            key,
            payload_key: payload_key.into(),
        };
        tracing::debug!(
            target: "auth_gate.verifier.jwt",
            header = %verifier.header.display(),
            alg = ?verifier.algorithm,
            payload_key = %verifier.payload_key,
            "JWT verifier created"
        );
        verifier
    }
}

#[async_trait]
impl Verifier for JwtVerifier {
    fn name(&self) -> &'static str {
        "jwt"
    }

    #[instrument(skip_all, name = "auth_gate.verifier.jwt")]
    async fn handle(&self, parts: &mut Parts) -> Result<(), AuthError> {
        let token = self.header.token(&parts.headers, &self.scheme)?;

        let parsed = parse_compact(token).map_err(|e| {
            tracing::debug!(target: "auth_gate.verifier.jwt", error = %e, "Token parse failed");
            AuthError::InvalidToken
        })?;

        let verified = verify_signature(token, self.algorithm, &self.key).map_err(|e| {
            tracing::debug!(target: "auth_gate.verifier.jwt", error = %e, "Token verification failed");
            AuthError::InvalidToken
        })?;

        if verified != parsed.payload {
            tracing::warn!(target: "auth_gate.verifier.jwt", "Verified payload differs from parsed payload");
            return Err(AuthError::InvalidToken);
        }

        validate_claims(&verified, chrono::Utc::now().timestamp()).map_err(|e| {
            tracing::debug!(target: "auth_gate.verifier.jwt", error = %e, "Token claims rejected");
            AuthError::InvalidToken
        })?;

        let payload = String::from_utf8(verified).map_err(|_| AuthError::InvalidToken)?;
        IdentityContext::attach(parts, &self.payload_key, payload);

        tracing::debug!(target: "auth_gate.verifier.jwt", "Token validated successfully");
        Ok(())
    }
}
