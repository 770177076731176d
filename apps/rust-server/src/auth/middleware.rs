// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applied with `route_layer` to the protected router subtree so that an
//! unauthenticated request is rejected before any handler (and therefore
//! any upstream call) runs:
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/api/items", get(list_items))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::extractor::{bearer_token, AccessToken};
use super::AuthError;
use crate::state::AppState;

/// Verify the bearer token and stash the principal in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        debug!(path = %request.uri().path(), "request without bearer token");
        return AuthError::MissingToken.into_response();
    };

    match state.verifier.verify(&token).await {
        Ok(user) => {
            debug!(user_id = %user.user_id, "authenticated request");
            request.extensions_mut().insert(user);
            request.extensions_mut().insert(AccessToken(token));
            next.run(request).await
        }
        Err(err) => {
            match &err {
                AuthError::KeyResolutionFailed(detail) => {
                    warn!(%detail, "signing key resolution failed")
                }
                other => debug!(error_code = other.error_code(), "token rejected"),
            }
            err.into_response()
        }
    }
}
