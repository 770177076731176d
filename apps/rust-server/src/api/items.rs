// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Item CRUD endpoints.
//!
//! All routes sit behind the auth middleware. Errors here use the
//! `{"message": ...}` body shape.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    api::extract::JsonBody,
    auth::Auth,
    error::{ApiError, MessageKey},
    models::{non_blank, Item, ItemInput},
    providers::UpstreamError,
    state::AppState,
};

const ITEM_NOT_FOUND: &str = "Item not found";

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ItemQuery {
    /// Only return items in this category.
    pub category: Option<String>,
}

/// Store failures other than a missing item or a write conflict are the
/// server's problem, so they surface as a 500 whatever status the store used.
fn upstream_error(err: UpstreamError, fallback: &str) -> ApiError {
    let err = match err {
        UpstreamError::Service { .. }
        | UpstreamError::Transport(_)
        | UpstreamError::InvalidResponse(_) => {
            error!(error = %err, "item store failure");
            return ApiError::internal(fallback).with_key(MessageKey::Message);
        }
        other => other,
    };
    ApiError::from_upstream(err, fallback)
        .with_message_for(StatusCode::NOT_FOUND, ITEM_NOT_FOUND)
        .with_key(MessageKey::Message)
}

fn not_found() -> ApiError {
    ApiError::not_found(ITEM_NOT_FOUND).with_key(MessageKey::Message)
}

#[utoipa::path(
    get,
    path = "/api/items",
    tag = "Items",
    security(("bearer_auth" = [])),
    params(ItemQuery),
    responses(
        (status = 200, description = "Items", body = [Item]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let category = non_blank(&query.category);
    let items = state
        .items
        .list_items(category)
        .await
        .map_err(|e| upstream_error(e, "Error retrieving items"))?;
    info!(user_id = %user.user_id, count = items.len(), category, "items listed");

    Ok(Json(items))
}

#[utoipa::path(
    get,
    path = "/api/items/{id}",
    tag = "Items",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "Item", body = Item),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let item = state
        .items
        .get_item(&id)
        .await
        .map_err(|e| upstream_error(e, "Error retrieving item"))?
        .ok_or_else(not_found)?;
    info!(user_id = %user.user_id, item_id = %id, "item fetched");

    Ok(Json(item))
}

/// Create an item owned by the caller. The id is generated here.
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "Items",
    security(("bearer_auth" = [])),
    request_body = ItemInput,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    Auth(user): Auth,
    JsonBody(input): JsonBody<ItemInput>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let fields = input.validate().map_err(ApiError::validation)?;

    let now = Utc::now();
    let item = Item {
        id: Uuid::new_v4().to_string(),
        name: fields.name,
        description: fields.description,
        category: fields.category,
        price: fields.price,
        created_by: user.user_id.clone(),
        created_at: now,
        updated_at: now,
    };

    let item = state
        .items
        .create_item(item)
        .await
        .map_err(|e| upstream_error(e, "Error creating item"))?;
    info!(user_id = %user.user_id, item_id = %item.id, "item created");

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    put,
    path = "/api/items/{id}",
    tag = "Items",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Item identifier")),
    request_body = ItemInput,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<ItemInput>,
) -> Result<Json<Item>, ApiError> {
    let fields = input.validate().map_err(ApiError::validation)?;

    let item = state
        .items
        .update_item(&id, fields, Utc::now())
        .await
        .map_err(|e| upstream_error(e, "Error updating item"))?;
    info!(user_id = %user.user_id, item_id = %item.id, "item updated");

    Ok(Json(item))
}

#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    tag = "Items",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Item identifier")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Item not found")
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .items
        .delete_item(&id)
        .await
        .map_err(|e| upstream_error(e, "Error deleting item"))?;
    info!(user_id = %user.user_id, item_id = %id, "item deleted");

    Ok(StatusCode::NO_CONTENT)
}
