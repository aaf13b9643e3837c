use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use heatmap_core::Resolution;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::stores::resolve_store;
use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateCameraRequest {
    pub camera_identifier: String,
    pub name: String,
    pub video_source: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProbeRequest {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(super) struct CameraItem {
    id: Uuid,
    store_id: Uuid,
    camera_identifier: String,
    name: String,
    video_source: String,
    resolution: Option<Resolution>,
    fps: Option<f64>,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<heatmap_db::CameraRow> for CameraItem {
    fn from(row: heatmap_db::CameraRow) -> Self {
        Self {
            resolution: row.resolution(),
            id: row.id,
            store_id: row.store_id,
            camera_identifier: row.camera_identifier,
            name: row.name,
            video_source: row.video_source,
            fps: row.fps,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// Resolve a camera id to its row, returning 404 if it does not exist.
pub(super) async fn resolve_camera(
    pool: &sqlx::PgPool,
    camera_id: Uuid,
    request_id: &str,
) -> Result<heatmap_db::CameraRow, ApiError> {
    heatmap_db::get_camera(pool, camera_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                request_id,
                "not_found",
                format!("camera {camera_id} not found"),
            )
        })
}

fn require_non_empty<'a>(request_id: &str, field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            format!("{field} must not be empty"),
        ));
    }
    Ok(trimmed)
}

/// POST /api/v1/stores/{store_id}/cameras
pub(super) async fn create_camera(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Json(body): Json<CreateCameraRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CameraItem>>), ApiError> {
    let rid = &req_id.0;
    resolve_store(&state.pool, store_id, rid).await?;

    let camera = heatmap_db::NewCamera {
        camera_identifier: require_non_empty(rid, "camera_identifier", &body.camera_identifier)?,
        name: require_non_empty(rid, "name", &body.name)?,
        video_source: require_non_empty(rid, "video_source", &body.video_source)?,
    };

    let row = heatmap_db::create_camera(&state.pool, store_id, camera)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::new(
                    rid,
                    "conflict",
                    format!(
                        "camera '{}' already exists in this store",
                        camera.camera_identifier
                    ),
                )
            } else {
                map_db_error(rid.clone(), &e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(row.into(), req_id.0)),
    ))
}

/// GET /api/v1/stores/{store_id}/cameras
pub(super) async fn list_cameras(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CameraItem>>>, ApiError> {
    resolve_store(&state.pool, store_id, &req_id.0).await?;
    let rows = heatmap_db::list_cameras_for_store(&state.pool, store_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(CameraItem::from).collect(),
        req_id.0,
    )))
}

/// PUT /api/v1/cameras/{camera_id}/probe
pub(super) async fn record_probe(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(camera_id): Path<Uuid>,
    Json(body): Json<ProbeRequest>,
) -> Result<Json<ApiResponse<CameraItem>>, ApiError> {
    let rid = &req_id.0;
    if body.width == 0 || body.height == 0 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "width and height must be positive",
        ));
    }
    if body.fps.is_some_and(|fps| !fps.is_finite() || fps <= 0.0) {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "fps must be positive",
        ));
    }

    let resolution = Resolution {
        width: body.width,
        height: body.height,
    };
    let row = heatmap_db::record_camera_probe(&state.pool, camera_id, resolution, body.fps)
        .await
        .map_err(|e| match e {
            heatmap_db::DbError::NotFound => ApiError::new(
                rid,
                "not_found",
                format!("camera {camera_id} not found"),
            ),
            other => map_db_error(rid.clone(), &other),
        })?;

    Ok(Json(ApiResponse::new(row.into(), req_id.0)))
}
