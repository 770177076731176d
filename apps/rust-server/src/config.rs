// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! All settings are read from the environment once at startup into a
//! [`Config`] that is handed to each component at construction. Missing
//! required keys abort startup with a single error naming every absent key.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AWS_REGION` | Region of the user pool and table | Required |
//! | `COGNITO_USER_POOL_ID` | Cognito user pool identifier | Required |
//! | `COGNITO_CLIENT_ID` | App client id (also the expected JWT audience) | Required |
//! | `ITEMS_TABLE_NAME` | DynamoDB table holding business items | Required |
//! | `COGNITO_CLIENT_SECRET` | App client secret (enables `SECRET_HASH`) | Optional |
//! | `COGNITO_ISSUER` | Expected JWT issuer | Derived from region and pool |
//! | `COGNITO_JWKS_URL` | JWKS endpoint | `{issuer}/.well-known/jwks.json` |
//! | `IDENTITY_BASE_URL` | Cognito endpoint override | Regional AWS endpoint |
//! | `STORE_BASE_URL` | DynamoDB endpoint override | Regional AWS endpoint |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `RATE_LIMIT_MAX` | Requests allowed per client per window | `100` |
//! | `RATE_LIMIT_WINDOW_SECS` | Rate limit window | `900` |
//! | `JWKS_CACHE_TTL_SECS` | Signing key cache lifetime | `600` |
//! | `JWKS_REQUESTS_PER_MINUTE` | JWKS fetch budget | `5` |
//! | `UPSTREAM_TIMEOUT_SECS` | Timeout for upstream HTTP calls | `10` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! AWS credentials are not part of this struct. They come from the SDK's
//! default provider chain (environment, shared profile, SSO, container or
//! instance role), resolved when the clients are built.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const AWS_REGION_ENV: &str = "AWS_REGION";
pub const USER_POOL_ID_ENV: &str = "COGNITO_USER_POOL_ID";
pub const CLIENT_ID_ENV: &str = "COGNITO_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "COGNITO_CLIENT_SECRET";
pub const ISSUER_ENV: &str = "COGNITO_ISSUER";
pub const JWKS_URL_ENV: &str = "COGNITO_JWKS_URL";
pub const ITEMS_TABLE_ENV: &str = "ITEMS_TABLE_NAME";
pub const IDENTITY_BASE_URL_ENV: &str = "IDENTITY_BASE_URL";
pub const STORE_BASE_URL_ENV: &str = "STORE_BASE_URL";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const RATE_LIMIT_MAX_ENV: &str = "RATE_LIMIT_MAX";
pub const RATE_LIMIT_WINDOW_ENV: &str = "RATE_LIMIT_WINDOW_SECS";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_REQUESTS_PER_MINUTE_ENV: &str = "JWKS_REQUESTS_PER_MINUTE";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Keys that must be present for the service to start.
pub const REQUIRED_KEYS: [&str; 4] = [
    AWS_REGION_ENV,
    USER_POOL_ID_ENV,
    CLIENT_ID_ENV,
    ITEMS_TABLE_ENV,
];

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RATE_LIMIT_MAX: usize = 100;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_JWKS_REQUESTS_PER_MINUTE: usize = 5;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Identity provider (Cognito user pool) settings.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Endpoint override; `None` uses the regional AWS endpoint.
    pub endpoint: Option<Url>,
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Expected `iss` claim.
    pub issuer: String,
    pub jwks_url: Url,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("jwks_url", &self.jwks_url.as_str())
            .finish()
    }
}

/// Item store (DynamoDB table) settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint override; `None` uses the regional AWS endpoint.
    pub endpoint: Option<Url>,
    pub table_name: String,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,
    pub identity: IdentityConfig,
    pub store: StoreConfig,
    pub bind_addr: SocketAddr,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    pub jwks_cache_ttl: Duration,
    pub jwks_requests_per_minute: usize,
    pub upstream_timeout: Duration,
    pub tls: Option<TlsPaths>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        // Presence checked above.
        let required = |key: &'static str| get(key).unwrap_or_default();

        let region = required(AWS_REGION_ENV);
        let user_pool_id = required(USER_POOL_ID_ENV);

        let issuer = get(ISSUER_ENV)
            .unwrap_or_else(|| format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}"));
        let issuer = issuer.trim_end_matches('/').to_string();

        let jwks_url = parse_url(
            JWKS_URL_ENV,
            get(JWKS_URL_ENV).unwrap_or_else(|| format!("{issuer}/.well-known/jwks.json")),
        )?;
        let identity_endpoint = get(IDENTITY_BASE_URL_ENV)
            .map(|value| parse_url(IDENTITY_BASE_URL_ENV, value))
            .transpose()?;
        let store_endpoint = get(STORE_BASE_URL_ENV)
            .map(|value| parse_url(STORE_BASE_URL_ENV, value))
            .transpose()?;

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or(get(PORT_ENV), PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e| ConfigError::Invalid {
                    key: HOST_ENV,
                    reason: format!("{host}:{port} is not a socket address ({e})"),
                })?;

        let rate_limit_max = parse_or(get(RATE_LIMIT_MAX_ENV), RATE_LIMIT_MAX_ENV, DEFAULT_RATE_LIMIT_MAX)?;
        let rate_limit_window_secs = parse_or(
            get(RATE_LIMIT_WINDOW_ENV),
            RATE_LIMIT_WINDOW_ENV,
            DEFAULT_RATE_LIMIT_WINDOW_SECS,
        )?;
        let jwks_cache_ttl_secs = parse_or(
            get(JWKS_CACHE_TTL_ENV),
            JWKS_CACHE_TTL_ENV,
            DEFAULT_JWKS_CACHE_TTL_SECS,
        )?;
        let jwks_requests_per_minute = parse_or(
            get(JWKS_REQUESTS_PER_MINUTE_ENV),
            JWKS_REQUESTS_PER_MINUTE_ENV,
            DEFAULT_JWKS_REQUESTS_PER_MINUTE,
        )?;
        let upstream_timeout_secs = parse_or(
            get(UPSTREAM_TIMEOUT_ENV),
            UPSTREAM_TIMEOUT_ENV,
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;

        if rate_limit_max == 0 {
            return Err(ConfigError::Invalid {
                key: RATE_LIMIT_MAX_ENV,
                reason: "must be at least 1".to_string(),
            });
        }
        if rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: RATE_LIMIT_WINDOW_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Invalid {
                    key: TLS_KEY_PATH_ENV,
                    reason: format!("required when {TLS_CERT_PATH_ENV} is set"),
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Invalid {
                    key: TLS_CERT_PATH_ENV,
                    reason: format!("required when {TLS_KEY_PATH_ENV} is set"),
                })
            }
        };

        Ok(Self {
            identity: IdentityConfig {
                endpoint: identity_endpoint,
                client_id: required(CLIENT_ID_ENV),
                client_secret: get(CLIENT_SECRET_ENV),
                issuer,
                jwks_url,
            },
            store: StoreConfig {
                endpoint: store_endpoint,
                table_name: required(ITEMS_TABLE_ENV),
            },
            region,
            bind_addr,
            rate_limit_max,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            jwks_requests_per_minute,
            upstream_timeout: Duration::from_secs(upstream_timeout_secs),
            tls,
        })
    }
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
    let url = Url::parse(&value).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{value} is not a URL ({e})"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("{raw}: {e}"),
        }),
        None => Ok(default),
    }
}
