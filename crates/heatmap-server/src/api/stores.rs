use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateStoreRequest {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StoreItem {
    id: Uuid,
    name: String,
    location: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<heatmap_db::StoreRow> for StoreItem {
    fn from(row: heatmap_db::StoreRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            location: row.location,
            created_at: row.created_at,
        }
    }
}

/// Resolve a store id to its row, returning 404 if it does not exist.
pub(super) async fn resolve_store(
    pool: &sqlx::PgPool,
    store_id: Uuid,
    request_id: &str,
) -> Result<heatmap_db::StoreRow, ApiError> {
    heatmap_db::get_store(pool, store_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                request_id,
                "not_found",
                format!("store {store_id} not found"),
            )
        })
}

/// POST /api/v1/stores
pub(super) async fn create_store(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateStoreRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StoreItem>>), ApiError> {
    let rid = &req_id.0;

    let name = body.name.trim();
    if name.is_empty() || name.len() > 200 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "name must be 1-200 characters",
        ));
    }
    let location = body
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    let row = heatmap_db::create_store(&state.pool, name, location)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(row.into(), req_id.0)),
    ))
}

/// GET /api/v1/stores
pub(super) async fn list_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<StoreItem>>>, ApiError> {
    let rows = heatmap_db::list_stores(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(StoreItem::from).collect(),
        req_id.0,
    )))
}

/// GET /api/v1/stores/{store_id}
pub(super) async fn get_store(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<StoreItem>>, ApiError> {
    let row = resolve_store(&state.pool, store_id, &req_id.0).await?;
    Ok(Json(ApiResponse::new(row.into(), req_id.0)))
}
