//! Remote JWKS with a local cache and single-flight refresh.
//!
//! Keys are fetched lazily from `{issuer}/.well-known/jwks.json` on first
//! use, served from memory while fresh, and refetched when the cache expires
//! or a token names a kid the cached set does not know (at most once per
//! cooldown window). Concurrent refreshes share one HTTP request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use jsonwebtoken::Algorithm;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::WalletConfig;
use crate::error::{KeyResolutionError, WalletError};
use crate::keys::{Jwk, Jwks, KeyCodec};
use crate::resolver::local::{LocalJwkSet, VerificationKey};

/// Cached key set with its fetch time.
struct CacheEntry {
    keys: LocalJwkSet,
    fetched_at: Instant,
}

type InflightFuture = Shared<BoxFuture<'static, Result<Arc<CacheEntry>, KeyResolutionError>>>;

/// JWKS document as served; keys are parsed one by one so a single odd
/// entry does not invalidate the whole set.
#[derive(Deserialize)]
struct RawJwks {
    keys: Vec<serde_json::Value>,
}

/// Key set fetched from an issuer's JWKS endpoint.
pub struct RemoteJwkSet {
    jwks_url: Url,
    http_client: reqwest::Client,
    codec: Arc<dyn KeyCodec>,
    ttl: Duration,
    cooldown: Duration,
    timeout: Duration,
    cache: Arc<ArcSwapOption<CacheEntry>>,
    inflight: Mutex<Option<InflightFuture>>,
}

impl RemoteJwkSet {
    /// Creates a remote key set. No request is made until the first lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        jwks_url: Url,
        config: &WalletConfig,
        codec: Arc<dyn KeyCodec>,
    ) -> Result<Self, WalletError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.jwks_timeout)
            .connect_timeout(config.jwks_timeout)
            .user_agent(concat!("jwt-wallet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KeyResolutionError::Fetch {
                url: jwks_url.to_string(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            jwks_url,
            http_client,
            codec,
            ttl: config.jwks_cache_ttl,
            cooldown: config.jwks_cooldown,
            timeout: config.jwks_timeout,
            cache: Arc::new(ArcSwapOption::empty()),
            inflight: Mutex::new(None),
        })
    }

    /// URL of the JWKS document.
    #[must_use]
    pub const fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }

    /// Resolves a verification key, fetching the key set when needed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyResolutionError`] on fetch failure or when no key applies.
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    pub async fn resolve(
        &self,
        kid: Option<&str>,
        algorithm: Option<Algorithm>,
    ) -> Result<Arc<VerificationKey>, KeyResolutionError> {
        let cached = self.cache.load_full();
        if let Some(entry) = &cached {
            if entry.fetched_at.elapsed() < self.ttl {
                match entry.keys.resolve(kid, algorithm) {
                    Ok(key) => return Ok(key),
                    Err(err) if entry.fetched_at.elapsed() < self.cooldown => return Err(err),
                    Err(err) => {
                        debug!(error = %err, "Key not in cached JWKS, refetching");
                    }
                }
            }
        }

        let entry = self
            .refresh_single_flight(cached.map(|entry| entry.fetched_at))
            .await?;
        entry.keys.resolve(kid, algorithm)
    }

    /// Whether the cache is empty or expired.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.cache
            .load_full()
            .is_none_or(|entry| entry.fetched_at.elapsed() >= self.ttl)
    }

    /// Number of keys currently cached.
    #[must_use]
    pub fn cached_key_count(&self) -> usize {
        self.cache.load_full().map_or(0, |entry| entry.keys.len())
    }

    /// Refreshes the cache; concurrent callers share one request.
    ///
    /// `seen` is the fetch time of the entry the caller found insufficient.
    /// A newer entry stored while waiting for the lock is returned as is.
    async fn refresh_single_flight(
        &self,
        seen: Option<Instant>,
    ) -> Result<Arc<CacheEntry>, KeyResolutionError> {
        let mut inflight_guard = self.inflight.lock().await;

        if let Some(current) = self.cache.load_full() {
            if seen.is_none_or(|seen| current.fetched_at > seen) {
                return Ok(current);
            }
        }

        if let Some(fut) = inflight_guard.as_ref() {
            // A completed future left behind by a cancelled caller must not be reused.
            if fut.peek().is_none() {
                let fut = fut.clone();
                drop(inflight_guard);
                return fut.await;
            }
        }

        let fut: BoxFuture<'static, Result<Arc<CacheEntry>, KeyResolutionError>> =
            Box::pin(Self::fetch(
                self.http_client.clone(),
                self.jwks_url.clone(),
                Arc::clone(&self.codec),
                Arc::clone(&self.cache),
                self.timeout,
            ));

        let shared_fut = fut.shared();
        *inflight_guard = Some(shared_fut.clone());
        drop(inflight_guard);

        let result = shared_fut.await;
        self.inflight.lock().await.take();
        result
    }

    async fn fetch(
        client: reqwest::Client,
        url: Url,
        codec: Arc<dyn KeyCodec>,
        cache: Arc<ArcSwapOption<CacheEntry>>,
        timeout: Duration,
    ) -> Result<Arc<CacheEntry>, KeyResolutionError> {
        info!(url = %url, "Fetching JWKS");

        let response = client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| classify_request_error(&e, &url, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyResolutionError::Fetch {
                url: url.to_string(),
                reason: format!("unexpected status {status}"),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_request_error(&e, &url, timeout))?;

        let raw: RawJwks =
            serde_json::from_slice(&body).map_err(|e| KeyResolutionError::MalformedDocument {
                reason: e.to_string(),
            })?;

        let keys: Vec<Jwk> = raw
            .keys
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed JWK entry");
                    None
                }
            })
            .collect();

        let entry = Arc::new(CacheEntry {
            keys: LocalJwkSet::lenient(&Jwks { keys }, codec.as_ref()),
            fetched_at: Instant::now(),
        });
        cache.store(Some(Arc::clone(&entry)));

        info!(url = %url, keys = entry.keys.len(), "JWKS cache updated");
        Ok(entry)
    }
}

impl std::fmt::Debug for RemoteJwkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteJwkSet")
            .field("jwks_url", &self.jwks_url.as_str())
            .field("ttl", &self.ttl)
            .field("cooldown", &self.cooldown)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn classify_request_error(err: &reqwest::Error, url: &Url, timeout: Duration) -> KeyResolutionError {
    if err.is_timeout() {
        KeyResolutionError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        KeyResolutionError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
