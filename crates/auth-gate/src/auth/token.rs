//! Compact JWS parsing and signature verification.
//!
//! Thin layer over `jsonwebtoken`: [`parse_compact`] splits a token into its
//! protected header and raw payload without checking the signature, and
//! [`verify_signature`] checks the signature with a given algorithm and key
//! and returns the payload it covers. Verifiers compare the two payloads
//! byte-for-byte before trusting either.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding
//! - The header `alg` must match the algorithm the caller verifies with
//! - Error variants carry no token material

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use thiserror::Error;

/// Maximum accepted compact token size in bytes (8KB).
///
/// Typical tokens are a few hundred bytes; anything larger is rejected before
/// base64 decoding or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Leeway in seconds applied to `exp` / `nbf` checks.
pub const CLAIMS_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token exceeds the maximum size")]
    TooLarge,

    #[error("token is not in compact serialization")]
    Malformed,

    #[error("token header could not be decoded: {0}")]
    Header(String),

    #[error("token payload is not valid base64url")]
    Payload,

    #[error("header algorithm {found:?} does not match expected {expected:?}")]
    AlgorithmMismatch {
        expected: Algorithm,
        found: Algorithm,
    },

    #[error("signature verification failed")]
    BadSignature,

    #[error("claims are not a JSON object")]
    Claims,

    #[error("token is expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,
}

/// A parsed but unverified compact token.
#[derive(Debug, Clone)]
pub struct CompactToken {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// The three segments of a compact token.
struct Segments<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
    signing_input: &'a str,
}

fn split_segments(token: &str) -> Result<Segments<'_>, TokenError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        return Err(TokenError::TooLarge);
    }

    let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
    let (header, payload) = signing_input
        .split_once('.')
        .ok_or(TokenError::Malformed)?;

    if header.is_empty() || signature.is_empty() || payload.contains('.') {
        return Err(TokenError::Malformed);
    }

    Ok(Segments {
        header,
        payload,
        signature,
        signing_input,
    })
}

/// Parse a compact token into header and raw payload without verifying it.
pub fn parse_compact(token: &str) -> Result<CompactToken, TokenError> {
    let segments = split_segments(token)?;

    let header =
        jsonwebtoken::decode_header(token).map_err(|e| TokenError::Header(e.to_string()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(segments.payload)
        .map_err(|_| TokenError::Payload)?;

    tracing::trace!(
        target: "auth_gate.token",
        header_len = segments.header.len(),
        alg = ?header.alg,
        "Parsed compact token"
    );

    Ok(CompactToken { header, payload })
}

/// Verify the token signature with `algorithm` and `key`.
///
/// Returns the payload covered by the verified signature.
pub fn verify_signature(
    token: &str,
    algorithm: Algorithm,
    key: &DecodingKey,
) -> Result<Vec<u8>, TokenError> {
    let segments = split_segments(token)?;

    let header =
        jsonwebtoken::decode_header(token).map_err(|e| TokenError::Header(e.to_string()))?;
    if header.alg != algorithm {
        return Err(TokenError::AlgorithmMismatch {
            expected: algorithm,
            found: header.alg,
        });
    }

    let valid = jsonwebtoken::crypto::verify(
        segments.signature,
        segments.signing_input.as_bytes(),
        key,
        algorithm,
    )
    .map_err(|e| {
        tracing::debug!(target: "auth_gate.token", error = %e, "Signature check errored");
        TokenError::BadSignature
    })?;

    if !valid {
        return Err(TokenError::BadSignature);
    }

    URL_SAFE_NO_PAD
        .decode(segments.payload)
        .map_err(|_| TokenError::Payload)
}

/// Check that a verified payload is a JSON claims object and that `exp` and
/// `nbf`, when present, hold at `now` (Unix seconds) within the leeway.
pub fn validate_claims(payload: &[u8], now: i64) -> Result<(), TokenError> {
    let claims: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(payload).map_err(|_| TokenError::Claims)?;

    if let Some(exp) = claims.get("exp") {
        let exp = exp.as_i64().ok_or(TokenError::Claims)?;
        if exp.saturating_add(CLAIMS_LEEWAY_SECONDS) < now {
            return Err(TokenError::Expired);
        }
    }

    if let Some(nbf) = claims.get("nbf") {
        let nbf = nbf.as_i64().ok_or(TokenError::Claims)?;
        if nbf.saturating_sub(CLAIMS_LEEWAY_SECONDS) > now {
            return Err(TokenError::NotYetValid);
        }
    }

    Ok(())
}
