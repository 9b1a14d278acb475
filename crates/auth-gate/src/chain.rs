//! Ordered verifier chain.
//!
//! [`AuthChain`] holds the active verifier list behind an `ArcSwap`. Each
//! request takes one snapshot of the list and walks it in order:
//!
//! - the first verifier that succeeds authenticates the request
//! - a failing verifier is recorded and the next one is tried
//! - when every verifier fails, the error of the LAST one evaluated is
//!   returned
//! - an empty list lets every request through
//!
//! Replacing the list with [`AuthChain::set_handlers`] never affects a
//! request that already took its snapshot.

use crate::errors::AuthError;
use crate::observability::metrics;
use crate::verifiers::Verifier;
use arc_swap::ArcSwap;
use axum::extract::Request;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::instrument;

pub struct AuthChain {
    verifiers: ArcSwap<Vec<Arc<dyn Verifier>>>,
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl AuthChain {
    pub fn new(verifiers: Vec<Arc<dyn Verifier>>) -> Self {
        Self {
            verifiers: ArcSwap::from_pointee(verifiers),
        }
    }

    /// Atomically replace the verifier list.
    pub fn set_handlers(&self, verifiers: Vec<Arc<dyn Verifier>>) {
        let names: Vec<&'static str> = verifiers.iter().map(|v| v.name()).collect();
        self.verifiers.store(Arc::new(verifiers));
        tracing::info!(target: "auth_gate.chain", verifiers = ?names, "Verifier chain replaced");
    }

    /// Snapshot of the current verifier list.
    pub fn handlers(&self) -> Arc<Vec<Arc<dyn Verifier>>> {
        self.verifiers.load_full()
    }

    /// Run the chain against `req`.
    ///
    /// On success returns the request carrying any identity data attached by
    /// the verifiers that ran.
    #[instrument(skip_all, name = "auth_gate.chain.authenticate")]
    pub async fn authenticate(&self, req: Request) -> Result<Request, AuthError> {
        let verifiers = self.verifiers.load_full();

        if verifiers.is_empty() {
            tracing::trace!(target: "auth_gate.chain", "Empty chain, request passes through");
            metrics::record_auth_outcome(true, StatusCode::OK.as_u16());
            return Ok(req);
        }

        let (mut parts, body) = req.into_parts();
        let mut last_error = None;

        for verifier in verifiers.iter() {
            match verifier.handle(&mut parts).await {
                Ok(()) => {
                    tracing::debug!(
                        target: "auth_gate.chain",
                        verifier = verifier.name(),
                        "Request authenticated"
                    );
                    metrics::record_auth_outcome(true, StatusCode::OK.as_u16());
                    return Ok(Request::from_parts(parts, body));
                }
                Err(e) => {
                    tracing::debug!(
                        target: "auth_gate.chain",
                        verifier = verifier.name(),
                        status = e.status().as_u16(),
                        error = %e,
                        "Verifier rejected request"
                    );
                    metrics::record_verifier_rejection(verifier.name(), e.status().as_u16());
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or(AuthError::Unauthorized);
        metrics::record_auth_outcome(false, err.status().as_u16());
        tracing::info!(
            target: "auth_gate.chain",
            status = err.status().as_u16(),
            error = %err,
            "Request rejected by every verifier"
        );
        Err(err)
    }
}
