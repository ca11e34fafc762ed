use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    db,
    error::{AppError, AppResult},
    handlers::JsonBody,
    models::{DecodeMode, InventoryItem, ItemChanges},
    AppState,
};

/// Ids that are not integers can never match a row, so they read as "not found".
fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_items(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Vec<InventoryItem>>)> {
    let start = Instant::now();
    let items = db::fetch_all_items(&state.db).await?;

    info!(
        count = items.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Listed items"
    );

    Ok((StatusCode::OK, Json(items)))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_item(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    let changes = ItemChanges::decode(&payload, DecodeMode::Create)?;

    let start = Instant::now();
    let item = db::insert_item(&state.db, &changes).await?;

    info!(
        id = item.id,
        name = %item.name,
        elapsed_ms = start.elapsed().as_millis(),
        "Created item"
    );

    Ok((StatusCode::CREATED, Json(item)))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    let id = parse_id(&id)?;
    let item = db::fetch_item_by_id(&state.db, id).await?;

    info!(id, "Fetched item");

    Ok((StatusCode::OK, Json(item)))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn replace_item(
    state: State<AppState>,
    id: Path<String>,
    body: Result<JsonBody, AppError>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    apply_update(state, id, body, DecodeMode::Replace).await
}

pub async fn patch_item(
    state: State<AppState>,
    id: Path<String>,
    body: Result<JsonBody, AppError>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    apply_update(state, id, body, DecodeMode::Partial).await
}

async fn apply_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<JsonBody, AppError>,
    mode: DecodeMode,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    let id = parse_id(&id)?;

    let changes = match body.and_then(|JsonBody(payload)| ItemChanges::decode(&payload, mode)) {
        Ok(changes) => changes,
        Err(err) => {
            // An unknown id takes precedence over a bad body.
            db::fetch_item_by_id(&state.db, id).await?;
            return Err(err);
        }
    };

    let start = Instant::now();
    let item = db::update_item(&state.db, id, &changes).await?;

    info!(
        id,
        partial = matches!(mode, DecodeMode::Partial),
        elapsed_ms = start.elapsed().as_millis(),
        "Updated item"
    );

    Ok((StatusCode::OK, Json(item)))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id)?;
    db::delete_item(&state.db, id).await?;

    info!(id, "Deleted item");

    Ok(StatusCode::NO_CONTENT)
}
