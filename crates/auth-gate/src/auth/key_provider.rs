//! Key provider: resolves the verification key for a token header.
//!
//! [`KeyProvider`] sits between a verifier and any [`KeyFetcher`]. It asks the
//! fetcher for a key by `kid`, then refuses keys that do not carry the
//! requested `kid` or cannot verify the chosen algorithm, so that a lookup
//! bug never turns into a substituted key.

use crate::auth::jwks::{declared_algorithm, key_supports, JwksCache, JwksError};
use crate::errors::AuthError;
use async_trait::async_trait;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyLookupError {
    #[error("no key found for kid {kid:?} and algorithm {algorithm:?}")]
    NoMatchingKey {
        kid: Option<String>,
        algorithm: Algorithm,
    },

    #[error("lookup for kid {requested:?} returned kid {found:?}")]
    KidMismatch {
        requested: String,
        found: Option<String>,
    },

    #[error("key {kid:?} cannot verify algorithm {algorithm:?}")]
    IncompatibleAlgorithm {
        kid: Option<String>,
        algorithm: Algorithm,
    },

    #[error("key could not be converted: {0}")]
    UnusableKey(String),

    #[error(transparent)]
    Fetch(#[from] JwksError),
}

impl From<KeyLookupError> for AuthError {
    fn from(err: KeyLookupError) -> Self {
        match err {
            KeyLookupError::NoMatchingKey { algorithm, .. } => AuthError::NoMatchingKey {
                algorithm: format!("{algorithm:?}"),
            },
            KeyLookupError::KidMismatch { .. } | KeyLookupError::UnusableKey(_) => {
                AuthError::KeyFetch
            }
            KeyLookupError::IncompatibleAlgorithm { .. } => AuthError::InvalidToken,
            KeyLookupError::Fetch(_) => AuthError::KeyFetch,
        }
    }
}

/// Source of candidate keys.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Find a key with `kid` (when given) able to verify `algorithm` (when
    /// given). `Ok(None)` means the source holds no such key.
    async fn fetch_key(
        &self,
        kid: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> Result<Option<Jwk>, KeyLookupError>;
}

/// Fetcher backed by one URL of a [`JwksCache`].
pub struct JwksKeyFetcher {
    cache: Arc<JwksCache>,
    url: String,
}

impl JwksKeyFetcher {
    pub fn new(cache: Arc<JwksCache>, url: impl Into<String>) -> Self {
        Self {
            cache,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache(&self) -> &Arc<JwksCache> {
        &self.cache
    }
}

#[async_trait]
impl KeyFetcher for JwksKeyFetcher {
    async fn fetch_key(
        &self,
        kid: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> Result<Option<Jwk>, KeyLookupError> {
        let snapshot = self.cache.get(&self.url).await?;
        Ok(snapshot.find(kid, algorithm).cloned())
    }
}

/// Resolves `(algorithm, key)` pairs for token headers.
pub struct KeyProvider<F> {
    fetcher: F,
    pinned: Option<Algorithm>,
}

impl<F: KeyFetcher> KeyProvider<F> {
    /// `pinned` restricts verification to one algorithm regardless of the
    /// token header.
    pub fn new(fetcher: F, pinned: Option<Algorithm>) -> Self {
        Self { fetcher, pinned }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn pinned(&self) -> Option<Algorithm> {
        self.pinned
    }

    /// Resolve the algorithm and key to verify a token carrying `header`.
    ///
    /// The algorithm is the pinned one, else the key's declared `alg`, else
    /// the header `alg`. The caller still checks that the header agrees.
    pub async fn resolve(&self, header: &Header) -> Result<(Algorithm, DecodingKey), KeyLookupError> {
        let kid = header.kid.as_deref();

        // Without a kid the algorithm is the only selector
        let filter = self.pinned.or(kid.is_none().then_some(header.alg));

        let jwk = self
            .fetcher
            .fetch_key(kid, filter)
            .await?
            .ok_or_else(|| KeyLookupError::NoMatchingKey {
                kid: kid.map(str::to_string),
                algorithm: self.pinned.unwrap_or(header.alg),
            })?;

        if let Some(requested) = kid {
            if jwk.common.key_id.as_deref() != Some(requested) {
                tracing::warn!(
                    target: "auth_gate.jwks",
                    requested_kid = %requested,
                    found_kid = ?jwk.common.key_id,
                    "Key lookup returned a different kid"
                );
                return Err(KeyLookupError::KidMismatch {
                    requested: requested.to_string(),
                    found: jwk.common.key_id.clone(),
                });
            }
        }

        let algorithm = self
            .pinned
            .or_else(|| declared_algorithm(&jwk))
            .unwrap_or(header.alg);

        if !key_supports(&jwk, algorithm) {
            return Err(KeyLookupError::IncompatibleAlgorithm {
                kid: jwk.common.key_id.clone(),
                algorithm,
            });
        }

        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            tracing::warn!(
                target: "auth_gate.jwks",
                kid = ?jwk.common.key_id,
                error = %e,
                "JWK could not be converted to a decoding key"
            );
            KeyLookupError::UnusableKey(e.to_string())
        })?;

        Ok((algorithm, key))
    }
}
