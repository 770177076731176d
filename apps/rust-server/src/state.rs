// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::jwks::{HttpKeySetSource, JwksManager};
use crate::auth::ClaimsVerifier;
use crate::config::Config;
use crate::providers::{load_sdk_config, CognitoClient, DynamoDbStore, IdentityProvider, ItemStore};
use crate::rate_limit::{RateLimiter, DEFAULT_CLIENT_CAPACITY};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build JWKS client: {0}")]
    Jwks(#[from] reqwest::Error),
}

/// Shared per-process state. Everything here is either immutable or the
/// signing-key cache and rate limiter, which synchronize internally.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<ClaimsVerifier>,
    pub identity: Arc<dyn IdentityProvider>,
    pub items: Arc<dyn ItemStore>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: &Config,
        verifier: ClaimsVerifier,
        identity: Arc<dyn IdentityProvider>,
        items: Arc<dyn ItemStore>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window,
            DEFAULT_CLIENT_CAPACITY,
        ));
        Self {
            verifier: Arc::new(verifier),
            identity,
            items,
            rate_limiter,
        }
    }

    /// Wire the real upstream clients described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let source = HttpKeySetSource::new(config.identity.jwks_url.clone(), config.upstream_timeout)?;
        let jwks = JwksManager::new(Arc::new(source))
            .with_cache_ttl(config.jwks_cache_ttl)
            .with_fetches_per_minute(config.jwks_requests_per_minute);
        let verifier = ClaimsVerifier::new(
            jwks,
            config.identity.issuer.clone(),
            config.identity.client_id.clone(),
        );

        let sdk = load_sdk_config(&config.region, config.upstream_timeout).await;
        let identity = CognitoClient::new(&sdk, &config.identity);
        let items = DynamoDbStore::new(&sdk, &config.store);

        Ok(Self::new(
            config,
            verifier,
            Arc::new(identity),
            Arc::new(items),
        ))
    }
}
