use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use heatmap_core::{
    classify_records, narrate, Classified, DailyHeatmap, DailyInsights, HourlyHeatmap, Narrative,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::cameras::resolve_camera;
use super::stores::resolve_store;
use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct HeatmapQuery {
    pub camera_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct InsightsQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(super) struct InsightsItem {
    #[serde(flatten)]
    insights: DailyInsights,
    narrative: Narrative,
}

/// Checks the store exists and, when filtering, that the camera is one of its own.
async fn check_scope(
    state: &AppState,
    store_id: Uuid,
    camera_id: Option<Uuid>,
    request_id: &str,
) -> Result<(), ApiError> {
    resolve_store(&state.pool, store_id, request_id).await?;
    if let Some(camera_id) = camera_id {
        let camera = resolve_camera(&state.pool, camera_id, request_id).await?;
        if camera.store_id != store_id {
            return Err(ApiError::new(
                request_id,
                "not_found",
                format!("camera {camera_id} not found in store {store_id}"),
            ));
        }
    }
    Ok(())
}

/// GET /api/v1/stores/{store_id}/heatmaps/hourly?camera_id=
pub(super) async fn list_hourly(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<ApiResponse<Vec<Classified<HourlyHeatmap>>>>, ApiError> {
    check_scope(&state, store_id, query.camera_id, &req_id.0).await?;
    let records = heatmap_db::list_hourly_heatmaps(&state.pool, store_id, query.camera_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        classify_records(&records, query.camera_id),
        req_id.0,
    )))
}

/// GET /api/v1/stores/{store_id}/heatmaps/daily?camera_id=
pub(super) async fn list_daily(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<ApiResponse<Vec<Classified<DailyHeatmap>>>>, ApiError> {
    check_scope(&state, store_id, query.camera_id, &req_id.0).await?;
    let records = heatmap_db::list_daily_heatmaps(&state.pool, store_id, query.camera_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        classify_records(&records, query.camera_id),
        req_id.0,
    )))
}

/// GET /api/v1/stores/{store_id}/insights?date=
pub(super) async fn list_insights(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Query(query): Query<InsightsQuery>,
) -> Result<Json<ApiResponse<Vec<InsightsItem>>>, ApiError> {
    resolve_store(&state.pool, store_id, &req_id.0).await?;

    let records = match query.date {
        Some(date) => heatmap_db::get_daily_insights(&state.pool, store_id, date)
            .await
            .map(|found| found.into_iter().collect::<Vec<_>>()),
        None => heatmap_db::list_daily_insights(&state.pool, store_id).await,
    }
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let config = state.config.insights_config();
    let data = records
        .into_iter()
        .map(|insights| InsightsItem {
            narrative: narrate(&insights, &config),
            insights,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
