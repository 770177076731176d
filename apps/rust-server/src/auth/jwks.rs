// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - Keys are cached with a configurable TTL
//! - A `kid` missing from a set that was not fetched during the same lookup
//!   triggers one refresh and one retry
//! - Fetches are limited to a fixed number per minute; once the budget is
//!   spent a miss fails without touching the network
//! - Stale cache is used on fetch failure (fail-open for availability)
//!
//! The network side sits behind [`KeySetSource`] so the cache can be driven
//! by a deterministic source in tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::error::AuthError;

/// Default JWKS cache TTL (10 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default number of JWKS fetches allowed per minute.
pub const DEFAULT_FETCHES_PER_MINUTE: usize = 5;

const FETCH_WINDOW: Duration = Duration::from_secs(60);

/// Where signing keys come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches the key set from the issuer's JWKS endpoint.
pub struct HttpKeySetSource {
    url: Url,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| AuthError::KeyResolutionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyResolutionFailed(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeyResolutionFailed(e.to_string()))
    }
}

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// A key set handed out by the cache, with whether this lookup fetched it.
struct Resolved {
    jwks: JwkSet,
    fetched_now: bool,
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    source: Arc<dyn KeySetSource>,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    fetches_per_minute: usize,
    fetch_log: Arc<Mutex<VecDeque<Instant>>>,
}

impl JwksManager {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            fetches_per_minute: DEFAULT_FETCHES_PER_MINUTE,
            fetch_log: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create with a custom fetch budget.
    pub fn with_fetches_per_minute(mut self, limit: usize) -> Self {
        self.fetches_per_minute = limit;
        self
    }

    /// Get a decoding key for the given key ID.
    ///
    /// Returns the algorithm the JWK declares, if any, alongside the key.
    pub async fn get_decoding_key(
        &self,
        kid: &str,
    ) -> Result<(DecodingKey, Option<Algorithm>), AuthError> {
        let resolved = self.current_set().await?;
        if let Some(jwk) = find_key(&resolved.jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        if resolved.fetched_now {
            return Err(AuthError::KeyResolutionFailed(format!(
                "no key with kid {kid}"
            )));
        }

        debug!(kid, "kid not in cached JWKS, refreshing");
        let jwks = self.fetch_and_store().await?;
        match find_key(&jwks, kid) {
            Some(jwk) => jwk_to_decoding_key(jwk),
            None => Err(AuthError::KeyResolutionFailed(format!(
                "no key with kid {kid}"
            ))),
        }
    }

    /// Number of keys currently available, fetching if the cache is cold.
    pub async fn key_count(&self) -> Result<usize, AuthError> {
        Ok(self.current_set().await?.jwks.keys.len())
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) => entry.fetched_at.elapsed() < self.cache_ttl,
            None => false,
        }
    }

    async fn current_set(&self) -> Result<Resolved, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(Resolved {
                        jwks: entry.jwks.clone(),
                        fetched_now: false,
                    });
                }
            }
        }

        match self.fetch_and_store().await {
            Ok(jwks) => Ok(Resolved {
                jwks,
                fetched_now: true,
            }),
            Err(err) => {
                let cache = self.cache.read().await;
                match &*cache {
                    Some(entry) => {
                        warn!(error = ?err, "JWKS fetch failed, using stale key set");
                        Ok(Resolved {
                            jwks: entry.jwks.clone(),
                            fetched_now: true,
                        })
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn fetch_and_store(&self) -> Result<JwkSet, AuthError> {
        self.take_fetch_slot()?;

        let jwks = self.source.fetch().await?;
        debug!(keys = jwks.keys.len(), "fetched JWKS");

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    fn take_fetch_slot(&self) -> Result<(), AuthError> {
        let now = Instant::now();
        let mut log = self
            .fetch_log
            .lock()
            .map_err(|_| AuthError::KeyResolutionFailed("JWKS fetch log poisoned".into()))?;

        while let Some(&oldest) = log.front() {
            if now.duration_since(oldest) >= FETCH_WINDOW {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.fetches_per_minute {
            return Err(AuthError::KeyResolutionFailed(
                "JWKS fetch budget exhausted".into(),
            ));
        }
        log.push_back(now);
        Ok(())
    }
}

fn find_key<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Option<Algorithm>), AuthError> {
    let declared = jwk.common.key_algorithm.and_then(|a| match a {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        _ => None,
    });

    let key = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e),
        AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y),
        _ => {
            return Err(AuthError::KeyResolutionFailed(
                "unsupported key type in JWKS".to_string(),
            ))
        }
    }
    .map_err(|e| AuthError::KeyResolutionFailed(format!("unusable JWK: {e}")))?;

    Ok((key, declared))
}
