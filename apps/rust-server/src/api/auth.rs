// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication API endpoints.
//!
//! Thin relays onto the user pool. Inputs are checked before any upstream
//! call; upstream failures go through [`ApiError::from_upstream`]. Errors on
//! these routes use the `{"error": ...}` body shape.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::{
    api::extract::JsonBody,
    auth::{extractor::bearer_token, AccessToken, Auth},
    error::ApiError,
    models::{
        non_blank, ChangePasswordRequest, ConfirmForgotPasswordRequest, ConfirmRequest,
        ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
        RegisterResponse, TokenResponse, UpdateProfileRequest, UserProfile, VerifiedUser,
        VerifyResponse,
    },
    providers::cognito::{NewUser, UserAttribute},
    state::AppState,
};

/// Register a new user in the pool.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Missing username, password or email"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (Some(username), Some(password), Some(email)) = (
        non_blank(&request.username),
        non_blank(&request.password),
        non_blank(&request.email),
    ) else {
        return Err(ApiError::bad_request(
            "Username, password, and email are required",
        ));
    };

    let user = NewUser {
        username: username.to_string(),
        password: password.to_string(),
        email: email.to_string(),
        name: non_blank(&request.name).map(str::to_string),
        phone_number: non_blank(&request.phone_number).map(str::to_string),
    };

    let user_sub = state.identity.sign_up(user).await.map_err(|e| {
        ApiError::from_upstream(e, "An error occurred during registration")
            .with_message_for(StatusCode::CONFLICT, "User already exists")
    })?;
    info!(%username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registration successful".to_string(),
            user_sub,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/confirm",
    tag = "Auth",
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "User confirmed", body = MessageResponse),
        (status = 400, description = "Missing username or confirmation code")
    )
)]
pub async fn confirm(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ConfirmRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(username), Some(code)) = (
        non_blank(&request.username),
        non_blank(&request.confirmation_code),
    ) else {
        return Err(ApiError::bad_request(
            "Username and confirmation code are required",
        ));
    };

    state
        .identity
        .confirm_sign_up(username, code)
        .await
        .map_err(|e| ApiError::from_upstream(e, "An error occurred during confirmation"))?;
    info!(%username, "user confirmed");

    Ok(Json(MessageResponse::new("User confirmation successful")))
}

/// Password login. Returns the pool's tokens as issued.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Additional authentication step required")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (Some(username), Some(password)) =
        (non_blank(&request.username), non_blank(&request.password))
    else {
        return Err(ApiError::bad_request("Username and password are required"));
    };

    let tokens = state
        .identity
        .initiate_auth(username, password)
        .await
        .map_err(|e| {
            ApiError::from_upstream(e, "An error occurred during login")
                .with_message_for(StatusCode::UNAUTHORIZED, "Invalid credentials")
        })?;
    info!(%username, "user login successful");

    Ok(Json(TokenResponse {
        message: "Login successful".to_string(),
        tokens,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = TokenResponse),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(refresh_token) = non_blank(&request.refresh_token) else {
        return Err(ApiError::bad_request("Refresh token is required"));
    };

    let mut tokens = state
        .identity
        .refresh(refresh_token, non_blank(&request.username))
        .await
        .map_err(|e| {
            ApiError::from_upstream(e, "An error occurred during token refresh")
                .with_message_for(StatusCode::UNAUTHORIZED, "Invalid refresh token")
        })?;
    // The refresh token the caller already holds is not echoed back.
    tokens.refresh_token = None;
    info!("token refresh successful");

    Ok(Json(TokenResponse {
        message: "Token refresh successful".to_string(),
        tokens,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code sent", body = MessageResponse),
        (status = 400, description = "Missing username")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(username) = non_blank(&request.username) else {
        return Err(ApiError::bad_request("Username is required"));
    };

    state.identity.forgot_password(username).await.map_err(|e| {
        ApiError::from_upstream(e, "An error occurred during password reset initiation")
    })?;
    info!(%username, "password reset initiated");

    Ok(Json(MessageResponse::new(
        "Password reset code sent to registered email",
    )))
}

#[utoipa::path(
    post,
    path = "/auth/confirm-forgot-password",
    tag = "Auth",
    request_body = ConfirmForgotPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Missing username, confirmation code or new password")
    )
)]
pub async fn confirm_forgot_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ConfirmForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(username), Some(code), Some(new_password)) = (
        non_blank(&request.username),
        non_blank(&request.confirmation_code),
        non_blank(&request.new_password),
    ) else {
        return Err(ApiError::bad_request(
            "Username, confirmation code, and new password are required",
        ));
    };

    state
        .identity
        .confirm_forgot_password(username, code, new_password)
        .await
        .map_err(|e| {
            ApiError::from_upstream(e, "An error occurred during password reset confirmation")
        })?;
    info!(%username, "password reset confirmed");

    Ok(Json(MessageResponse::new("Password reset successful")))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Missing old or new password"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Auth(user): Auth,
    AccessToken(access_token): AccessToken,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(old_password), Some(new_password)) = (
        non_blank(&request.old_password),
        non_blank(&request.new_password),
    ) else {
        return Err(ApiError::bad_request(
            "Old password and new password are required",
        ));
    };

    state
        .identity
        .change_password(&access_token, old_password, new_password)
        .await
        .map_err(|e| ApiError::from_upstream(e, "An error occurred during password change"))?;
    info!(user_id = %user.user_id, "password changed");

    Ok(Json(MessageResponse::new("Password change successful")))
}

/// The caller's user pool attributes.
#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Auth(user): Auth,
    AccessToken(access_token): AccessToken,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.identity.get_user(&access_token).await.map_err(|e| {
        ApiError::from_upstream(e, "An error occurred while retrieving user profile")
    })?;
    info!(user_id = %user.user_id, "user profile retrieved");

    Ok(Json(profile))
}

#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = MessageResponse),
        (status = 400, description = "No attribute to update"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Auth(user): Auth,
    AccessToken(access_token): AccessToken,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let attributes: Vec<UserAttribute> = [
        ("name", non_blank(&request.name)),
        ("phone_number", non_blank(&request.phone_number)),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| UserAttribute::new(name, v)))
    .collect();

    if attributes.is_empty() {
        return Err(ApiError::bad_request(
            "At least one attribute to update is required",
        ));
    }

    state
        .identity
        .update_user_attributes(&access_token, attributes)
        .await
        .map_err(|e| {
            ApiError::from_upstream(e, "An error occurred while updating user profile")
        })?;
    info!(user_id = %user.user_id, "user profile updated");

    Ok(Json(MessageResponse::new("User profile updated successfully")))
}

/// Revoke every token issued to the caller.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Auth(user): Auth,
    AccessToken(access_token): AccessToken,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .identity
        .global_sign_out(&access_token)
        .await
        .map_err(|e| ApiError::from_upstream(e, "An error occurred during logout"))?;
    info!(user_id = %user.user_id, "user logged out");

    Ok(Json(MessageResponse::new("Logout successful")))
}

/// Check a bearer token without calling the user pool.
///
/// Not behind the auth middleware: an invalid token is reported in the
/// response body rather than rejected by the gate.
#[utoipa::path(
    get,
    path = "/auth/verify",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token is missing or invalid")
    )
)]
pub async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return invalid_token("No token provided");
    };

    match state.verifier.verify(token).await {
        Ok(user) => Json(VerifyResponse {
            valid: true,
            user: VerifiedUser {
                id: user.user_id,
                username: user.username,
            },
        })
        .into_response(),
        Err(err) => invalid_token(&err.to_string()),
    }
}

fn invalid_token(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "valid": false, "message": message })),
    )
        .into_response()
}
