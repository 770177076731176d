// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::models::FieldError;
use crate::providers::UpstreamError;

/// JSON field carrying the human-readable message.
///
/// Auth routes answer `{"error": ...}`, item routes `{"message": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    Error,
    Message,
}

impl MessageKey {
    fn as_str(self) -> &'static str {
        match self {
            MessageKey::Error => "error",
            MessageKey::Message => "message",
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub key: MessageKey,
    pub errors: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            key: MessageKey::Error,
            errors: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 400 listing every invalid field.
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::bad_request("Validation failed").with_key(MessageKey::Message)
        }
    }

    pub fn with_key(mut self, key: MessageKey) -> Self {
        self.key = key;
        self
    }

    /// Replace the message when the error ended up with `status`.
    pub fn with_message_for(mut self, status: StatusCode, message: impl Into<String>) -> Self {
        if self.status == status {
            self.message = message.into();
        }
        self
    }

    /// Translate an upstream failure.
    ///
    /// An upstream error status is always passed through. Client-side
    /// failures keep the upstream's message too; server failures carry
    /// `fallback` instead. Transport failures become a 500 with `fallback`.
    /// Server-side causes are logged only.
    pub fn from_upstream(err: UpstreamError, fallback: &str) -> Self {
        match err {
            UpstreamError::AlreadyExists(message) => {
                warn!(%message, "upstream conflict");
                Self::conflict(message)
            }
            UpstreamError::NotFound(message) => {
                warn!(%message, "upstream not found");
                Self::not_found(message)
            }
            UpstreamError::Unauthorized(message) => {
                warn!(%message, "upstream rejected credentials");
                Self::unauthorized(message)
            }
            UpstreamError::ChallengeRequired(challenge) => {
                warn!(%challenge, "upstream requires another authentication step");
                Self::new(
                    StatusCode::FORBIDDEN,
                    format!("Additional authentication step required: {challenge}"),
                )
            }
            UpstreamError::Service {
                status,
                code,
                message,
            } if (400..500).contains(&status) => {
                warn!(status, %code, %message, "upstream rejected request");
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
                Self::new(status, message)
            }
            UpstreamError::Service {
                status,
                code,
                message,
            } if (500..600).contains(&status) => {
                error!(status, %code, %message, "upstream service failure");
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Self::new(status, fallback)
            }
            other => {
                error!(error = %other, "upstream failure");
                Self::internal(fallback)
            }
        }
    }
}

/// A body that is not JSON, or not JSON of the expected shape, is a 400
/// whatever axum would have answered.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(reason = %rejection.body_text(), "rejected request body");
        Self::bad_request("Request body must be valid JSON")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert(self.key.as_str().to_string(), Value::String(self.message));
        if let Some(errors) = self.errors {
            body.insert(
                "errors".to_string(),
                serde_json::to_value(errors).unwrap_or(Value::Null),
            );
        }
        (self.status, Json(Value::Object(body))).into_response()
    }
}
