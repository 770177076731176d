// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CloudSec Gateway - Authentication & Item Relay Service
//!
//! Stateless HTTP front for a Cognito user pool and a DynamoDB item table.
//! Bearer tokens are verified locally against the pool's published signing
//! keys before any protected handler runs.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Cognito JWT verification, JWKS cache and auth middleware
//! - `providers` - Cognito and DynamoDB JSON-protocol clients, SigV4 signing
//! - `rate_limit` - Per-client inbound request limiter

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
