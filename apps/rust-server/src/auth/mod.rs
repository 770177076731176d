// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Cognito JWT verification for the gateway.
//!
//! ## Auth Flow
//!
//! 1. Client logs in through `/auth/login` and receives user pool tokens
//! 2. Client sends `Authorization: Bearer <token>` on protected routes
//! 3. Gateway:
//!    - Resolves the signing key by `kid` from the pool's JWKS (cached)
//!    - Verifies signature, expiry, issuer and audience
//!    - Extracts `sub` as the canonical `user_id`
//!
//! ## Security
//!
//! - Only asymmetric algorithms are accepted
//! - Every rejection is a 401, whatever the underlying cause
//! - JWKS is cached with TTL and fetches are rate limited
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AccessToken, Auth};
pub use jwks::JwksManager;
pub use verifier::ClaimsVerifier;
