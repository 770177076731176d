// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Reasons a bearer token is rejected.
///
/// Every variant maps to `401 Unauthorized`. The underlying cause (for
/// example a JWKS fetch failure) is logged but never changes the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable `Authorization: Bearer` header
    MissingToken,
    /// Token cannot be parsed, lacks a key id, or misses required claims
    MalformedToken,
    /// `exp` is in the past (or `nbf` in the future)
    ExpiredToken,
    /// Signature does not verify, or the algorithm is not allowed
    SignatureInvalid,
    /// `iss` differs from the configured issuer
    IssuerMismatch,
    /// Neither `aud` nor `client_id` matches the configured audience
    AudienceMismatch,
    /// Signing key could not be resolved from the JWKS
    KeyResolutionFailed(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: &'static str,
    valid: bool,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::ExpiredToken => "expired_token",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::KeyResolutionFailed(_) => "key_resolution_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "No token provided"),
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::ExpiredToken => write!(f, "Token has expired"),
            AuthError::SignatureInvalid => write!(f, "Token signature is invalid"),
            AuthError::IssuerMismatch => write!(f, "Token issuer is invalid"),
            AuthError::AudienceMismatch => write!(f, "Token audience is invalid"),
            // Key lookup detail stays in the logs.
            AuthError::KeyResolutionFailed(_) => write!(f, "Token signing key could not be resolved"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code(),
            valid: false,
        });
        (status, body).into_response()
    }
}
