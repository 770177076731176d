// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `aud` is a string in Cognito ID tokens but may be an array elsewhere.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// Claims carried by a Cognito ID or access token.
///
/// ID tokens name the app client in `aud`; access tokens carry it in
/// `client_id` and have no `aud` at all.
#[derive(Debug, Clone, Deserialize)]
pub struct CognitoClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: Option<i64>,

    /// Issuer (the user pool URL)
    pub iss: String,

    #[serde(default)]
    pub aud: Option<Audience>,

    #[serde(default)]
    pub client_id: Option<String>,

    /// Present on access tokens
    #[serde(default)]
    pub username: Option<String>,

    /// Present on ID tokens
    #[serde(default, rename = "cognito:username")]
    pub cognito_username: Option<String>,

    /// `id` or `access`
    #[serde(default)]
    pub token_use: Option<String>,
}

impl CognitoClaims {
    /// Whether `aud` (ID tokens) or `client_id` (access tokens) names `expected`.
    pub fn audience_matches(&self, expected: &str) -> bool {
        self.aud.as_ref().is_some_and(|aud| aud.contains(expected))
            || self.client_id.as_deref() == Some(expected)
    }
}

/// Authenticated user information extracted from a verified JWT.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request. It lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    pub username: String,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,

    #[serde(skip)]
    pub issued_at: Option<i64>,

    #[serde(skip)]
    pub token_use: Option<String>,
}

impl AuthenticatedUser {
    /// Create from verified claims.
    pub fn from_claims(claims: CognitoClaims) -> Self {
        let username = claims
            .username
            .or(claims.cognito_username)
            .unwrap_or_else(|| claims.sub.clone());

        Self {
            user_id: claims.sub,
            username,
            expires_at: claims.exp,
            issued_at: claims.iat,
            token_use: claims.token_use,
        }
    }
}
