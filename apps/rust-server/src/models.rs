// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive `ToSchema`
//! for the OpenAPI document.
//!
//! Request bodies accept every field as optional so that a missing field is
//! reported by the handler's own validation (400 with a specific message)
//! rather than by the JSON extractor.
//!
//! ## Model Categories
//!
//! - **Auth**: registration, login, password and profile requests
//! - **Tokens**: identity/access/refresh tokens relayed from the user pool
//! - **Items**: business items held in the item store

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// The value of a required field, if it is present and not blank.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Auth Requests
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    /// Display name; defaults to the username.
    pub name: Option<String>,
    #[serde(rename = "phone_number")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
    /// Only needed when the app client has a secret.
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmForgotPasswordRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

// =============================================================================
// Auth Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_sub: String,
}

/// Tokens issued by the user pool. Never stored by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub id_token: String,
    pub access_token: String,
    /// Absent on refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub message: String,
    pub tokens: TokenSet,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifiedUser {
    /// Subject (`sub`) of the token.
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: VerifiedUser,
}

// =============================================================================
// Items
// =============================================================================

/// A business item as stored and returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    /// `sub` of the user who created the item.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update body before validation.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ItemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Value>,
}

/// Validated, writable item fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFields {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl ItemInput {
    /// Check required fields and shape. Reports every problem at once.
    pub fn validate(self) -> Result<ItemFields, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = non_blank(&self.name).map(|v| v.trim().to_string());
        if name.is_none() {
            errors.push(FieldError::new("name", "Name is required"));
        }

        let category = non_blank(&self.category).map(|v| v.trim().to_string());
        if category.is_none() {
            errors.push(FieldError::new("category", "Category is required"));
        }

        let price = match &self.price {
            None | Some(Value::Null) => {
                errors.push(FieldError::new("price", "Price is required"));
                None
            }
            Some(value) => match value.as_f64() {
                Some(p) if p.is_finite() && p >= 0.0 => Some(p),
                _ => {
                    errors.push(FieldError::new(
                        "price",
                        "Price must be a non-negative number",
                    ));
                    None
                }
            },
        };

        match (name, category, price) {
            (Some(name), Some(category), Some(price)) if errors.is_empty() => Ok(ItemFields {
                name,
                description: self.description.unwrap_or_default(),
                category,
                price,
            }),
            _ => Err(errors),
        }
    }
}
