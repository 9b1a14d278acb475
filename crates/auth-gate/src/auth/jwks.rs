//! JWKS key store: per-URL cache of remote key sets.
//!
//! Each registered URL owns one cache entry holding the last fetched key set.
//! Reads are lock-free (`ArcSwapOption`); fetches are serialized per URL by a
//! mutex that also records the time of the last fetch attempt.
//!
//! # Refresh policy
//!
//! - The refresh window is an eagerness hint: once a key set is older than
//!   the window, the next read checks whether a fetch is due.
//! - The minimum refresh interval is a hard floor between two fetch attempts
//!   for the same URL, however many reads arrive.
//! - Only one fetch per URL is ever in flight. A reader that finds a fetch
//!   running serves the current key set instead of waiting.
//! - A failed refresh keeps the previous key set and serves it.
//!
//! The cancellation token passed at construction bounds every fetch and
//! stops the optional background refresher.

use crate::observability::metrics;
use arc_swap::ArcSwapOption;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::Algorithm;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, Instrument};

/// Default refresh window (1 minute).
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(60);

/// Default minimum interval between fetches (5 minutes).
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Timeout for one JWKS HTTP request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest tick of the background refresher.
const MIN_REFRESHER_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwksError {
    #[error("JWKS URL is not registered: {0}")]
    NotRegistered(String),

    #[error("JWKS request failed: {0}")]
    Request(String),

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("JWKS document could not be parsed: {0}")]
    Parse(String),

    #[error("no key set fetched yet and next attempt is throttled")]
    NotReady,

    #[error("JWKS fetch cancelled")]
    Cancelled,
}

/// An immutable, fetched key set.
#[derive(Debug)]
pub struct KeySetSnapshot {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

impl KeySetSnapshot {
    /// Build a snapshot, keeping the first key for every duplicated `kid`.
    fn new(set: JwkSet, fetched_at: Instant) -> Self {
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(set.keys.len());
        for key in set.keys {
            if let Some(kid) = key.common.key_id.as_deref() {
                if !seen.insert(kid.to_string()) {
                    tracing::warn!(target: "auth_gate.jwks", kid = %kid, "Dropping duplicate kid from JWKS");
                    continue;
                }
            }
            keys.push(key);
        }
        Self { keys, fetched_at }
    }

    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// Scan for a key matching `kid` (when given) that can verify `algorithm`
    /// (when given). The first match in document order wins.
    pub fn find(&self, kid: Option<&str>, algorithm: Option<Algorithm>) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| {
            kid.map_or(true, |kid| jwk.common.key_id.as_deref() == Some(kid))
                && algorithm.map_or(true, |alg| key_supports(jwk, alg))
        })
    }
}

/// Signing algorithm a JWK declares in its `alg` member, if any.
pub fn declared_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    match jwk.common.key_algorithm.as_ref()? {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        // Encryption algorithms never verify signatures
        _ => None,
    }
}

/// Whether `jwk` can verify signatures made with `algorithm`.
///
/// The key type must belong to the algorithm's family, and a declared `alg`
/// must equal `algorithm`.
pub fn key_supports(jwk: &Jwk, algorithm: Algorithm) -> bool {
    let family_matches = matches!(
        (&jwk.algorithm, algorithm),
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ) | (
            AlgorithmParameters::EllipticCurve(_),
            Algorithm::ES256 | Algorithm::ES384
        ) | (AlgorithmParameters::OctetKeyPair(_), Algorithm::EdDSA)
            | (
                AlgorithmParameters::OctetKey(_),
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
            )
    );

    let declared_matches =
        jwk.common.key_algorithm.is_none() || declared_algorithm(jwk) == Some(algorithm);

    family_matches && declared_matches
}

/// Cache entry for one registered URL.
struct CacheEntry {
    url: String,
    min_refresh_interval: Duration,
    current: ArcSwapOption<KeySetSnapshot>,
    /// Held for the duration of a fetch; stores when the last fetch started.
    last_attempt: Mutex<Option<Instant>>,
}

impl CacheEntry {
    fn fetch_due(&self, last_attempt: Option<Instant>) -> bool {
        last_attempt.map_or(true, |at| at.elapsed() >= self.min_refresh_interval)
    }
}

/// Per-URL JWKS cache with throttled, single-flight refresh.
pub struct JwksCache {
    http_client: reqwest::Client,
    refresh_window: Duration,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    cancel: CancellationToken,
}

impl JwksCache {
    /// Create a cache whose lifetime is bound to `cancel`.
    pub fn new(refresh_window: Duration, cancel: CancellationToken) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth_gate.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });
        Self::with_client(http_client, refresh_window, cancel)
    }

    pub fn with_client(
        http_client: reqwest::Client,
        refresh_window: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http_client,
            refresh_window,
            entries: RwLock::new(HashMap::new()),
            cancel,
        }
    }

    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    /// Declare `url` with its fetch floor. Registering an existing URL is a
    /// no-op and keeps the first interval and cached keys.
    pub async fn register(&self, url: &str, min_refresh_interval: Duration) {
        let mut entries = self.entries.write().await;
        if entries.contains_key(url) {
            tracing::debug!(target: "auth_gate.jwks", url = %url, "JWKS URL already registered");
            return;
        }
        entries.insert(
            url.to_string(),
            Arc::new(CacheEntry {
                url: url.to_string(),
                min_refresh_interval,
                current: ArcSwapOption::empty(),
                last_attempt: Mutex::new(None),
            }),
        );
        tracing::info!(
            target: "auth_gate.jwks",
            url = %url,
            min_refresh_interval_secs = min_refresh_interval.as_secs(),
            "JWKS URL registered"
        );
    }

    pub async fn is_registered(&self, url: &str) -> bool {
        self.entries.read().await.contains_key(url)
    }

    async fn entry(&self, url: &str) -> Result<Arc<CacheEntry>, JwksError> {
        self.entries
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| JwksError::NotRegistered(url.to_string()))
    }

    /// Fetch `url` now, ignoring the refresh window and interval.
    ///
    /// Waits for an in-flight fetch of the same URL to finish first.
    #[instrument(skip(self), target = "auth_gate.jwks")]
    pub async fn refresh(&self, url: &str) -> Result<Arc<KeySetSnapshot>, JwksError> {
        let entry = self.entry(url).await?;
        let mut last_attempt = entry.last_attempt.lock().await;
        self.fetch_into(&entry, &mut last_attempt).await
    }

    /// Current key set for `url`, refreshing it first when due.
    ///
    /// Fails only when no key set has ever been fetched for `url` and one
    /// cannot be obtained now.
    #[instrument(skip(self), target = "auth_gate.jwks")]
    pub async fn get(&self, url: &str) -> Result<Arc<KeySetSnapshot>, JwksError> {
        let entry = self.entry(url).await?;

        let Some(current) = entry.current.load_full() else {
            return self.first_fetch(&entry).await;
        };

        if current.fetched_at.elapsed() <= self.refresh_window {
            return Ok(current);
        }

        let Ok(mut last_attempt) = entry.last_attempt.try_lock() else {
            tracing::debug!(target: "auth_gate.jwks", url = %url, "JWKS fetch in flight, serving current keys");
            return Ok(current);
        };

        if !entry.fetch_due(*last_attempt) {
            // Another reader may have refreshed since we loaded `current`
            return Ok(entry.current.load_full().unwrap_or(current));
        }

        match self.fetch_into(&entry, &mut last_attempt).await {
            Ok(fresh) => Ok(fresh),
            Err(e) => {
                tracing::warn!(
                    target: "auth_gate.jwks",
                    url = %url,
                    error = %e,
                    key_age_secs = current.fetched_at.elapsed().as_secs(),
                    "JWKS refresh failed, serving cached keys"
                );
                Ok(current)
            }
        }
    }

    /// Fetch for an entry that has no key set yet, waiting on any in-flight
    /// fetch rather than racing it.
    async fn first_fetch(&self, entry: &CacheEntry) -> Result<Arc<KeySetSnapshot>, JwksError> {
        let mut last_attempt = entry.last_attempt.lock().await;

        if let Some(current) = entry.current.load_full() {
            return Ok(current);
        }
        if !entry.fetch_due(*last_attempt) {
            return Err(JwksError::NotReady);
        }

        self.fetch_into(entry, &mut last_attempt).await
    }

    async fn fetch_into(
        &self,
        entry: &CacheEntry,
        last_attempt: &mut MutexGuard<'_, Option<Instant>>,
    ) -> Result<Arc<KeySetSnapshot>, JwksError> {
        **last_attempt = Some(Instant::now());

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(JwksError::Cancelled),
            result = self.fetch(&entry.url) => result,
        };

        match result {
            Ok(set) => {
                let snapshot = Arc::new(KeySetSnapshot::new(set, Instant::now()));
                entry.current.store(Some(Arc::clone(&snapshot)));
                metrics::record_jwks_fetch("success");
                tracing::info!(
                    target: "auth_gate.jwks",
                    url = %entry.url,
                    key_count = snapshot.len(),
                    "JWKS cache refreshed"
                );
                Ok(snapshot)
            }
            Err(JwksError::Cancelled) => {
                metrics::record_jwks_fetch("cancelled");
                tracing::debug!(target: "auth_gate.jwks", url = %entry.url, "JWKS fetch cancelled");
                Err(JwksError::Cancelled)
            }
            Err(e) => {
                metrics::record_jwks_fetch("error");
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, JwksError> {
        tracing::debug!(target: "auth_gate.jwks", url = %url, "Fetching JWKS");

        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::error!(target: "auth_gate.jwks", url = %url, error = %e, "Failed to fetch JWKS");
            JwksError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "auth_gate.jwks",
                url = %url,
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(JwksError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::Request(e.to_string()))?;

        serde_json::from_slice::<JwkSet>(&body).map_err(|e| {
            tracing::error!(target: "auth_gate.jwks", url = %url, error = %e, "Failed to parse JWKS response");
            JwksError::Parse(e.to_string())
        })
    }

    /// Spawn a task that checks every registered URL once per refresh window
    /// (through [`JwksCache::get`], so the same throttle applies) until the
    /// cancellation token fires.
    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let tick = self.refresh_window.max(MIN_REFRESHER_TICK);

        tokio::spawn(
            async move {
                tracing::info!(target: "auth_gate.jwks", tick_secs = tick.as_secs(), "JWKS refresher started");
                let mut interval = tokio::time::interval(tick);
                // The first tick completes immediately
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => cache.refresh_all().await,
                        _ = cache.cancel.cancelled() => {
                            tracing::info!(target: "auth_gate.jwks", "JWKS refresher received shutdown signal, exiting");
                            break;
                        }
                    }
                }
            }
            .instrument(tracing::info_span!("auth_gate.jwks.refresher")),
        )
    }

    async fn refresh_all(&self) {
        let urls: Vec<String> = self.entries.read().await.keys().cloned().collect();
        for url in urls {
            if let Err(e) = self.get(&url).await {
                tracing::warn!(target: "auth_gate.jwks", url = %url, error = %e, "Background JWKS refresh failed");
            }
        }
    }

    /// Cancel in-flight fetches and stop refreshing. Cached keys remain
    /// readable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
