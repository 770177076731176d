// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated requests.
//!
//! Use the `Auth` extractor in handlers to get the verified principal, and
//! `AccessToken` when the raw bearer token must be forwarded upstream:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth, AccessToken(token): AccessToken) -> impl IntoResponse {
//!     // user is AuthenticatedUser, token is the verified bearer string
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Returns `None` for a missing header, another scheme, or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor for authenticated users.
///
/// Behind the auth middleware this reads the principal it stored. On a
/// route without the middleware it verifies the bearer token itself.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let user = state.verifier.verify(token).await?;
        Ok(Auth(user))
    }
}

/// The caller's bearer token, for operations the identity provider
/// authorizes by access token (profile, password change, sign-out).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl FromRequestParts<AppState> for AccessToken {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts.extensions.get::<AccessToken>().cloned() {
            return Ok(token);
        }

        bearer_token(&parts.headers)
            .map(|token| AccessToken(token.to_string()))
            .ok_or(AuthError::MissingToken)
    }
}
