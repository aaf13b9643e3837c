//! Zone endpoints.
//!
//! A zone can be submitted either as a ready video-space polygon or as the
//! raw points an operator clicked on the drawing surface. Canvas points go
//! through the same capture/close/transform steps the editor uses, then
//! both paths share one validation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use heatmap_core::{
    CanvasPoint, CanvasSize, CoreError, NewZone, PixelPoint, Zone, ZoneCapture, ZoneCategory,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::cameras::resolve_camera;
use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateZoneRequest {
    pub zone_identifier: Option<String>,
    pub name: String,
    pub category: ZoneCategory,
    pub color: Option<String>,
    pub min_dwell_secs: Option<u32>,
    /// Video-space vertices.
    pub polygon: Option<Vec<PixelPoint>>,
    /// Canvas-space clicks, in order.
    pub canvas_points: Option<Vec<CanvasPoint>>,
    /// Drawing surface the clicks were made on; defaults to the configured canvas.
    pub canvas: Option<CanvasSize>,
}

#[derive(Debug, Serialize)]
pub(super) struct ZoneItem {
    #[serde(flatten)]
    zone: Zone,
}

fn capture_to_video(
    points: &[CanvasPoint],
    canvas: CanvasSize,
    resolution: Option<heatmap_core::Resolution>,
) -> Result<Vec<PixelPoint>, CoreError> {
    let canvas = CanvasSize::new(canvas.width, canvas.height)?;
    let mut capture = ZoneCapture::new(canvas);
    for point in points {
        capture.push(*point)?;
    }
    Ok(capture.close()?.to_video(resolution)?)
}

/// POST /api/v1/cameras/{camera_id}/zones
pub(super) async fn create_zone(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(camera_id): Path<Uuid>,
    Json(body): Json<CreateZoneRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ZoneItem>>), ApiError> {
    let rid = &req_id.0;
    let camera = resolve_camera(&state.pool, camera_id, rid).await?;
    let resolution = camera.resolution();

    let polygon = match (body.polygon, body.canvas_points) {
        (Some(polygon), None) => polygon,
        (None, Some(points)) => {
            let canvas = body.canvas.unwrap_or_else(|| state.config.canvas_size());
            capture_to_video(&points, canvas, resolution).map_err(|e| map_core_error(rid, &e))?
        }
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "provide exactly one of 'polygon' or 'canvas_points'",
            ))
        }
    };

    let spec = NewZone {
        zone_identifier: body.zone_identifier,
        name: body.name,
        polygon,
        category: body.category,
        color: body.color,
        min_dwell_secs: body.min_dwell_secs,
    }
    .validate(resolution, state.config.default_min_dwell_secs)
    .map_err(|e| map_core_error(rid, &e))?;

    let zone = heatmap_db::create_zone(&state.pool, camera_id, &spec)
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                ApiError::new(
                    rid,
                    "conflict",
                    format!(
                        "zone '{}' already exists on this camera",
                        spec.zone_identifier
                    ),
                )
            } else {
                map_db_error(rid.clone(), &e)
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ZoneItem { zone }, req_id.0)),
    ))
}

/// GET /api/v1/cameras/{camera_id}/zones
pub(super) async fn list_zones(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(camera_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ZoneItem>>>, ApiError> {
    resolve_camera(&state.pool, camera_id, &req_id.0).await?;
    let zones = heatmap_db::list_zones_for_camera(&state.pool, camera_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        zones.into_iter().map(|zone| ZoneItem { zone }).collect(),
        req_id.0,
    )))
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedZone {
    id: Uuid,
    deleted: bool,
}

/// DELETE /api/v1/zones/{zone_id}
pub(super) async fn delete_zone(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedZone>>, ApiError> {
    let rid = &req_id.0;
    heatmap_db::delete_zone(&state.pool, zone_id)
        .await
        .map_err(|e| match e {
            heatmap_db::DbError::NotFound => {
                ApiError::new(rid, "not_found", format!("zone {zone_id} not found"))
            }
            other => map_db_error(rid.clone(), &other),
        })?;

    Ok(Json(ApiResponse::new(
        DeletedZone {
            id: zone_id,
            deleted: true,
        },
        req_id.0,
    )))
}
