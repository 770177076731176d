// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Clients for the managed services the gateway relays to.
//!
//! Both are thin wrappers over the AWS SDK. Service failures are classified
//! into [`UpstreamError`] here so handlers never see raw SDK errors or
//! service exception codes.

pub mod cognito;
pub mod dynamodb;

use std::time::Duration;

use aws_config::{timeout::TimeoutConfig, BehaviorVersion, Region, SdkConfig};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use axum::http::StatusCode;

pub use cognito::{CognitoClient, IdentityProvider};
pub use dynamodb::{DynamoDbStore, ItemStore};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The pool wants another authentication step (new password, MFA)
    /// before it issues tokens.
    #[error("authentication challenge {0} required")]
    ChallengeRequired(String),

    #[error("{code} ({status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream response was invalid: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Classify a service error by its exception code.
    pub fn from_service(status: u16, code: Option<&str>, message: Option<&str>) -> Self {
        let code = code.unwrap_or_default().to_string();
        let message = message.map(str::to_string).unwrap_or_else(|| {
            StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("error")
                .to_string()
        });

        match code.as_str() {
            "UsernameExistsException" | "AliasExistsException" => Self::AlreadyExists(message),
            "UserNotFoundException" => Self::NotFound(message),
            "NotAuthorizedException" => Self::Unauthorized(message),
            _ => Self::Service {
                status,
                code,
                message,
            },
        }
    }

    /// Service-level failure code, if the upstream named one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } if !code.is_empty() => Some(code),
            _ => None,
        }
    }
}

impl<E> From<SdkError<E, HttpResponse>> for UpstreamError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(err: SdkError<E, HttpResponse>) -> Self {
        match &err {
            SdkError::ServiceError(context) => Self::from_service(
                context.raw().status().as_u16(),
                context.err().code(),
                context.err().message(),
            ),
            SdkError::ResponseError(_) => {
                Self::InvalidResponse(DisplayErrorContext(&err).to_string())
            }
            _ => Self::Transport(DisplayErrorContext(&err).to_string()),
        }
    }
}

/// Shared SDK configuration: region and per-operation timeout from config,
/// credentials from the default provider chain.
pub async fn load_sdk_config(region: &str, timeout: Duration) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
        .load()
        .await
}
