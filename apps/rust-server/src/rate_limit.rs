// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-client request rate limiting.
//!
//! Each client address keeps a sliding log of request instants. A request is
//! admitted while fewer than `max` instants fall inside the window; an
//! instant leaves the log only once strictly more than `window` has passed.
//! Client logs live in an LRU map so the table stays bounded no matter how
//! many distinct addresses show up.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use lru::LruCache;
use serde_json::json;
use tokio::time::Instant;
use tracing::warn;

/// Default number of distinct clients tracked.
pub const DEFAULT_CLIENT_CAPACITY: usize = 10_000;

const RATE_LIMIT_LIMIT: &str = "ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "ratelimit-remaining";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

pub struct RateLimiter {
    clients: Mutex<LruCache<String, VecDeque<Instant>>>,
    max: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            clients: Mutex::new(LruCache::new(capacity)),
            max,
            window,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Record a request from `client` if its quota allows.
    pub fn check(&self, client: &str) -> Decision {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let log = clients.get_or_insert_mut(client.to_string(), VecDeque::new);

        while let Some(&oldest) = log.front() {
            if now.duration_since(oldest) > self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        if log.len() >= self.max {
            let elapsed = log
                .front()
                .map(|oldest| now.duration_since(*oldest))
                .unwrap_or_default();
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed) + Duration::from_secs(1),
            };
        }

        log.push_back(now);
        Decision::Allowed {
            remaining: self.max - log.len(),
        }
    }
}

/// Client identity for rate limiting: socket peer, else the first
/// `X-Forwarded-For` entry, else `"unknown"`.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware: reject with 429 once the client's quota is spent.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match limiter.check(&client) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limiter.max()));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            warn!(client = %client, "rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many requests, please try again later." })),
            )
                .into_response();
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limiter.max()));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0usize));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    const WINDOW: Duration = Duration::from_secs(900);

    #[tokio::test(start_paused = true)]
    async fn admits_max_then_limits_until_window_strictly_passes() {
        let limiter = RateLimiter::new(3, WINDOW, 16);

        for remaining in [2, 1, 0] {
            assert_eq!(limiter.check("1.2.3.4"), Decision::Allowed { remaining });
        }
        assert!(matches!(limiter.check("1.2.3.4"), Decision::Limited { .. }));

        tokio::time::advance(WINDOW).await;
        assert!(matches!(limiter.check("1.2.3.4"), Decision::Limited { .. }));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(matches!(limiter.check("1.2.3.4"), Decision::Allowed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn clients_have_independent_quotas() {
        let limiter = RateLimiter::new(1, WINDOW, 16);
        assert!(matches!(limiter.check("a"), Decision::Allowed { .. }));
        assert!(matches!(limiter.check("a"), Decision::Limited { .. }));
        assert!(matches!(limiter.check("b"), Decision::Allowed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down_with_the_window() {
        let limiter = RateLimiter::new(1, WINDOW, 16);
        limiter.check("a");
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(
            limiter.check("a"),
            Decision::Limited {
                retry_after: Duration::from_secs(301)
            }
        );
    }

    #[test]
    fn client_key_prefers_socket_then_forwarded_for() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_key(&request), "192.0.2.1");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }

    #[tokio::test(start_paused = true)]
    async fn middleware_returns_429_with_retry_after() {
        let limiter = Arc::new(RateLimiter::new(1, WINDOW, 16));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter, rate_limit));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[RATE_LIMIT_REMAINING], "0");

        let second = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[RETRY_AFTER], "901");
    }
}
