//! Credential verifiers.
//!
//! Every verifier implements [`Verifier`]: it inspects the request head and
//! either accepts it (optionally attaching identity data) or returns an
//! [`AuthError`]. Verifiers are combined by [`crate::chain::AuthChain`].
//!
//! # Components
//!
//! - `api_key` - Static API key membership test
//! - `jwt` - JWT verified with a statically configured key
//! - `jwks` - JWT verified with a key resolved from a remote JWKS

pub mod api_key;
pub mod jwks;
pub mod jwt;

pub use api_key::ApiKeyVerifier;
pub use jwks::JwksVerifier;
pub use jwt::JwtVerifier;

use crate::errors::AuthError;
use async_trait::async_trait;
use axum::http::{request::Parts, HeaderMap, HeaderName};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Capability shared by all credential verifiers.
///
/// `handle` receives the current request head. Enrichment is done in place
/// (see [`IdentityContext::attach`]) so it carries forward to later verifiers
/// and to the downstream handler.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Short stable name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    async fn handle(&self, parts: &mut Parts) -> Result<(), AuthError>;
}

/// Verified identity data attached to a request.
///
/// Maps a configured lookup key (e.g. `USER`) to the raw verified token
/// payload. The map is never mutated in place; attaching a value stores a
/// new context in the request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityContext {
    entries: Arc<BTreeMap<String, String>>,
}

impl IdentityContext {
    /// Return a copy of this context with `key` set to `payload`.
    #[must_use]
    pub fn with(&self, key: &str, payload: String) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key.to_string(), payload);
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Store `payload` under `key` in the request head's identity context.
    pub fn attach(parts: &mut Parts, key: &str, payload: String) {
        let next = parts
            .extensions
            .get::<IdentityContext>()
            .map_or_else(IdentityContext::default, Clone::clone)
            .with(key, payload);
        parts.extensions.insert(next);
    }
}

/// Extension trait for reading identity data from a request.
pub trait IdentityExt {
    /// Get the verified payload stored under `key`.
    ///
    /// Returns `None` if no verifier attached a value under that key.
    fn identity(&self, key: &str) -> Option<&str>;
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn identity(&self, key: &str) -> Option<&str> {
        self.extensions()
            .get::<IdentityContext>()
            .and_then(|ctx| ctx.get(key))
    }
}

impl IdentityExt for Parts {
    fn identity(&self, key: &str) -> Option<&str> {
        self.extensions
            .get::<IdentityContext>()
            .and_then(|ctx| ctx.get(key))
    }
}

/// Header location of a credential: the header to read and its display name.
#[derive(Debug, Clone)]
pub struct CredentialHeader {
    name: HeaderName,
    display: String,
}

impl CredentialHeader {
    /// Parse a configured header name.
    pub fn parse(header: &str) -> Result<Self, axum::http::header::InvalidHeaderName> {
        Ok(Self {
            name: HeaderName::from_bytes(header.as_bytes())?,
            display: header.to_string(),
        })
    }

    /// Name as configured, used in error messages.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Read the header value as raw bytes.
    ///
    /// An absent or empty header is a missing credential. Any other byte
    /// content, including obs-text (0x80-0xFF), is returned unchanged.
    pub fn bytes<'a>(&self, headers: &'a HeaderMap) -> Result<&'a [u8], AuthError> {
        headers
            .get(&self.name)
            .map(|value| value.as_bytes())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AuthError::missing(&self.display))
    }

    /// Read the header value as text.
    ///
    /// An absent or empty header is a missing credential; a value that is
    /// not visible ASCII is malformed.
    pub fn value<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, AuthError> {
        let value = self.bytes(headers)?;

        std::str::from_utf8(value)
            .ok()
            .filter(|value| value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b)))
            .ok_or_else(|| {
                tracing::debug!(
                    target: "auth_gate.verifier",
                    header = %self.display,
                    "Header value is not visible ASCII"
                );
                AuthError::malformed(&self.display)
            })
    }

    /// Extract a token, stripping the scheme prefix when one is configured.
    ///
    /// With a non-empty `scheme`, the header must split into exactly two
    /// parts around it; the token is the trimmed remainder.
    pub fn token<'a>(&self, headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, AuthError> {
        let value = self.value(headers)?;
        if scheme.is_empty() {
            return Ok(value);
        }

        let mut parts = value.split(scheme);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(token), None) => Ok(token.trim()),
            _ => {
                tracing::debug!(
                    target: "auth_gate.verifier",
                    header = %self.display,
                    "Header does not contain the scheme exactly once"
                );
                Err(AuthError::malformed(&self.display))
            }
        }
    }
}
