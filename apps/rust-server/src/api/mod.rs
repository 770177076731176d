// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::any::Any;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::error;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::require_auth,
    models::{
        ChangePasswordRequest, ConfirmForgotPasswordRequest, ConfirmRequest, FieldError,
        ForgotPasswordRequest, Item, ItemInput, LoginRequest, MessageResponse, RefreshRequest,
        RegisterRequest, RegisterResponse, TokenResponse, TokenSet, UpdateProfileRequest,
        UserProfile, VerifiedUser, VerifyResponse,
    },
    rate_limit::rate_limit,
    state::AppState,
};

pub mod auth;
pub mod extract;
pub mod health;
pub mod items;

pub fn router(state: AppState) -> Router {
    // Everything here requires a verified bearer token. The gate runs as a
    // route layer so unmatched paths still fall through to the 404 handler.
    let protected = Router::new()
        .route("/auth/change-password", post(auth::change_password))
        .route(
            "/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/auth/logout", post(auth::logout))
        .route(
            "/api/items",
            get(items::list_items).post(items::create_item),
        )
        .route(
            "/api/items/{id}",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/auth/register", post(auth::register))
        .route("/auth/confirm", post(auth::confirm))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route(
            "/auth/confirm-forgot-password",
            post(auth::confirm_forgot_password),
        )
        .route("/auth/verify", get(auth::verify));

    let http_stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(security_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(header::X_FRAME_OPTIONS, "SAMEORIGIN"))
        .layer(security_header(header::X_XSS_PROTECTION, "1; mode=block"))
        .layer(security_header(
            header::REFERRER_POLICY,
            "strict-origin-when-cross-origin",
        ))
        .layer(security_header(header::X_DNS_PREFETCH_CONTROL, "on"))
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(not_found)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(http_stack)
}

fn security_header(
    name: header::HeaderName,
    value: &'static str,
) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, HeaderValue::from_static(value))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(%detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "An unexpected error occurred" })),
    )
        .into_response()
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::readiness,
        auth::register,
        auth::confirm,
        auth::login,
        auth::refresh,
        auth::forgot_password,
        auth::confirm_forgot_password,
        auth::change_password,
        auth::get_profile,
        auth::update_profile,
        auth::logout,
        auth::verify,
        items::list_items,
        items::get_item,
        items::create_item,
        items::update_item,
        items::delete_item
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            RegisterRequest,
            RegisterResponse,
            ConfirmRequest,
            LoginRequest,
            RefreshRequest,
            ForgotPasswordRequest,
            ConfirmForgotPasswordRequest,
            ChangePasswordRequest,
            UpdateProfileRequest,
            MessageResponse,
            TokenSet,
            TokenResponse,
            UserProfile,
            VerifiedUser,
            VerifyResponse,
            Item,
            ItemInput,
            FieldError
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "User pool registration, login and profile"),
        (name = "Items", description = "Item management")
    )
)]
struct ApiDoc;
