//! Chain assembly from configuration.
//!
//! Builds one verifier per configured handler, in configured order. The JWKS
//! verifier performs its first key fetch here, so a service never starts
//! with a JWKS verifier that has no keys.

use crate::auth::jwks::{JwksCache, JwksError};
use crate::chain::AuthChain;
use crate::config::{Config, HandlerKind};
use crate::verifiers::jwks::JwksVerifierConfig;
use crate::verifiers::jwt::decoding_key_from_material;
use crate::verifiers::{ApiKeyVerifier, JwksVerifier, JwtVerifier, Verifier};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("handler '{0}' is listed but not configured")]
    MissingSection(&'static str),

    #[error("failed to initialize API key verifier")]
    ApiKeyInit,

    #[error("invalid JWT signature key: {0}")]
    SignatureKey(String),

    #[error("initial JWKS fetch failed: {0}")]
    Jwks(#[from] JwksError),
}

/// Ready-to-use chain plus the key store backing it, if any.
pub struct Bootstrapped {
    pub chain: AuthChain,
    pub jwks_cache: Option<Arc<JwksCache>>,
}

/// Build the verifier chain described by `config`.
///
/// `cancel` bounds the JWKS key store: cancelling it aborts in-flight fetches
/// and stops the background refresher.
///
/// # Errors
///
/// Returns error if a signature key cannot be loaded or the initial JWKS
/// fetch fails.
pub async fn build_chain(
    config: &Config,
    cancel: CancellationToken,
) -> Result<Bootstrapped, BootstrapError> {
    let mut verifiers: Vec<Arc<dyn Verifier>> = Vec::with_capacity(config.handlers.len());
    let mut jwks_cache = None;

    for kind in &config.handlers {
        match kind {
            HandlerKind::ApiKey => {
                let section = config
                    .api_key
                    .as_ref()
                    .ok_or(BootstrapError::MissingSection(kind.as_str()))?;
                let verifier =
                    ApiKeyVerifier::new(section.header.clone(), section.keys.iter().cloned())
                        .map_err(|_| BootstrapError::ApiKeyInit)?;
                verifiers.push(Arc::new(verifier));
            }
            HandlerKind::Jwt => {
                let section = config
                    .jwt
                    .as_ref()
                    .ok_or(BootstrapError::MissingSection(kind.as_str()))?;
                let key = decoding_key_from_material(section.algorithm, &section.signature_key)
                    .map_err(|e| BootstrapError::SignatureKey(e.to_string()))?;
                verifiers.push(Arc::new(JwtVerifier::new(
                    section.header.clone(),
                    section.token_type.clone(),
                    section.algorithm,
                    key,
                    section.payload_key.clone(),
                )));
            }
            HandlerKind::Jwks => {
                let section = config
                    .jwks
                    .as_ref()
                    .ok_or(BootstrapError::MissingSection(kind.as_str()))?;
                let cache = Arc::new(JwksCache::new(section.refresh_window, cancel.clone()));
                let verifier = JwksVerifier::new(
                    JwksVerifierConfig {
                        header: section.header.clone(),
                        scheme: section.token_type.clone(),
                        url: section.url.clone(),
                        min_refresh_interval: section.min_refresh_interval,
                        algorithm: section.algorithm,
                        payload_key: section.payload_key.clone(),
                    },
                    Arc::clone(&cache),
                )
                .await?;

                if section.background_refresh {
                    cache.spawn_refresher();
                }

                verifiers.push(Arc::new(verifier));
                jwks_cache = Some(cache);
            }
        }
    }

    tracing::info!(
        target: "auth_gate.chain",
        verifiers = ?config.handlers.iter().map(HandlerKind::as_str).collect::<Vec<_>>(),
        "Verifier chain built"
    );

    Ok(Bootstrapped {
        chain: AuthChain::new(verifiers),
        jwks_cache,
    })
}
