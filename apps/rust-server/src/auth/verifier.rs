// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against the user pool's signing keys.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::debug;

use super::claims::{AuthenticatedUser, CognitoClaims};
use super::error::AuthError;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Asymmetric algorithms only. Anything else (HS* in particular) is
/// rejected before a key is looked up.
pub const ALLOWED_ALGORITHMS: [Algorithm; 5] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Verifies signature, expiry, issuer and audience of a bearer token.
pub struct ClaimsVerifier {
    jwks: JwksManager,
    issuer: String,
    audience: String,
    leeway: u64,
}

impl ClaimsVerifier {
    pub fn new(jwks: JwksManager, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: CLOCK_SKEW_LEEWAY,
        }
    }

    pub fn jwks(&self) -> &JwksManager {
        &self.jwks
    }

    /// Verify `token` and build the principal from its claims.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            debug!(alg = ?header.alg, "rejecting token with disallowed algorithm");
            return Err(AuthError::SignatureInvalid);
        }

        let kid = header.kid.as_deref().ok_or(AuthError::MalformedToken)?;
        let (decoding_key, declared) = self.jwks.get_decoding_key(kid).await?;
        if declared.is_some_and(|alg| alg != header.alg) {
            return Err(AuthError::SignatureInvalid);
        }

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Access tokens carry the client in `client_id`, checked below.
        validation.validate_aud = false;

        let token_data =
            decode::<CognitoClaims>(token, &decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => {
                        AuthError::ExpiredToken
                    }
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        AuthError::SignatureInvalid
                    }
                    ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
                    _ => AuthError::MalformedToken,
                }
            })?;

        let claims = token_data.claims;
        if !claims.audience_matches(&self.audience) {
            return Err(AuthError::AudienceMismatch);
        }

        Ok(AuthenticatedUser::from_claims(claims))
    }
}
