//! Processing job endpoints.
//!
//! The server never processes video itself. An external pipeline starts a
//! job, pushes progress, and finally pushes either its raw visits or
//! pre-aggregated hourly counters. Completion turns those into hourly,
//! daily and insight records, swaps them in atomically, and only then marks
//! the job completed.

use std::collections::{BTreeMap, HashMap, HashSet};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use heatmap_core::{
    derive_daily_insights, normalize_hourly, rollup_daily, rollup_hourly,
    unique_visitors_by_zone_day, CameraProgress, CoreError, DailyUniques, HourlyHeatmap,
    JobSnapshot, JobSummary, VisitEvent, Zone,
};
use heatmap_db::StoreResults;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::stores::resolve_store;
use super::{map_core_error, map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ProgressRequest {
    pub job_id: Uuid,
    pub progress: BTreeMap<Uuid, CameraProgress>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FailRequest {
    pub job_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CompleteRequest {
    pub job_id: Uuid,
    pub results: CompletionResults,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(super) struct ZoneDayUniques {
    pub zone_id: Uuid,
    pub date: NaiveDate,
    pub unique_visitors: u32,
}

/// What the pipeline hands back when it finishes.
#[derive(Debug, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub(super) enum CompletionResults {
    /// Completed visits; everything else is derived here.
    Visits {
        visits: Vec<VisitEvent>,
        #[serde(default)]
        total_unique_customers: BTreeMap<NaiveDate, u32>,
    },
    /// Hourly counters aggregated upstream.
    Hourly {
        hourly: Vec<HourlyHeatmap>,
        #[serde(default)]
        daily_uniques: Vec<ZoneDayUniques>,
        #[serde(default)]
        total_unique_customers: BTreeMap<NaiveDate, u32>,
    },
}

/// POST /api/v1/stores/{store_id}/process
pub(super) async fn start_processing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<JobSnapshot>>), ApiError> {
    let rid = &req_id.0;
    resolve_store(&state.pool, store_id, rid).await?;

    let cameras: Vec<(Uuid, String)> = heatmap_db::list_cameras_for_store(&state.pool, store_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .into_iter()
        .filter(heatmap_db::CameraRow::is_active)
        .map(|c| (c.id, c.name))
        .collect();

    let snapshot = state
        .jobs
        .start(store_id, &cameras)
        .map_err(|e| map_core_error(rid, &e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(snapshot, req_id.0)),
    ))
}

/// GET /api/v1/stores/{store_id}/processing-status
pub(super) async fn processing_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobSnapshot>>, ApiError> {
    resolve_store(&state.pool, store_id, &req_id.0).await?;
    let snapshot = state.jobs.status(store_id);
    Ok(Json(ApiResponse::new(snapshot, req_id.0)))
}

/// POST /api/v1/stores/{store_id}/process/progress
pub(super) async fn report_progress(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Json(body): Json<ProgressRequest>,
) -> Result<Json<ApiResponse<JobSnapshot>>, ApiError> {
    let snapshot = state
        .jobs
        .update_progress(store_id, body.job_id, body.progress)
        .map_err(|e| map_core_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(snapshot, req_id.0)))
}

/// POST /api/v1/stores/{store_id}/process/fail
pub(super) async fn fail_processing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Json(body): Json<FailRequest>,
) -> Result<Json<ApiResponse<JobSnapshot>>, ApiError> {
    let message = body.message.trim();
    let message = if message.is_empty() {
        "processing failed"
    } else {
        message
    };
    let snapshot = state
        .jobs
        .fail(store_id, body.job_id, message)
        .map_err(|e| map_core_error(&req_id.0, &e))?;
    Ok(Json(ApiResponse::new(snapshot, req_id.0)))
}

/// POST /api/v1/stores/{store_id}/process/complete
pub(super) async fn complete_processing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(store_id): Path<Uuid>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<ApiResponse<JobSnapshot>>, ApiError> {
    let rid = &req_id.0;

    // Validate before claiming so a bad payload leaves the job processing.
    let zones = heatmap_db::list_zones_for_store(&state.pool, store_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let results =
        build_store_results(store_id, &zones, body.results).map_err(|e| map_core_error(rid, &e))?;

    // Held until the results are committed; fail and progress are refused
    // meanwhile, so stored results always belong to the job that completes.
    state
        .jobs
        .begin_finalize(store_id, body.job_id)
        .map_err(|e| map_core_error(rid, &e))?;

    if let Err(e) = heatmap_db::replace_store_results(&state.pool, store_id, &results).await {
        if let Err(abort_err) =
            state
                .jobs
                .abort_finalize(store_id, body.job_id, "failed to store processing results")
        {
            tracing::warn!(%store_id, error = %abort_err, "could not mark job failed");
        }
        return Err(map_db_error(rid.clone(), &e));
    }

    let summary = JobSummary {
        hourly_heatmaps: results.hourly.len(),
        daily_heatmaps: results.daily.len(),
        insights_generated: results.insights.len(),
    };
    let snapshot = state
        .jobs
        .finish_finalize(store_id, body.job_id, summary)
        .map_err(|e| map_core_error(rid, &e))?;
    Ok(Json(ApiResponse::new(snapshot, req_id.0)))
}

/// Derives every stored record from the pipeline's output.
///
/// Per-day customer totals fall back to distinct (camera, person) pairs for
/// raw visits, and to the sum of zone uniques for hourly input.
pub(super) fn build_store_results(
    store_id: Uuid,
    zones: &[Zone],
    results: CompletionResults,
) -> Result<StoreResults, CoreError> {
    let known: HashSet<Uuid> = zones.iter().map(|z| z.id).collect();

    let (hourly, uniques, customers) = match results {
        CompletionResults::Visits {
            visits,
            total_unique_customers,
        } => {
            if let Some(v) = visits.iter().find(|v| !known.contains(&v.zone_id)) {
                return Err(CoreError::InvalidZone(format!(
                    "zone {} does not belong to store {store_id}",
                    v.zone_id
                )));
            }
            let customers = if total_unique_customers.is_empty() {
                customers_from_visits(&visits)
            } else {
                total_unique_customers
            };
            (
                rollup_hourly(zones, &visits),
                unique_visitors_by_zone_day(&visits),
                customers,
            )
        }
        CompletionResults::Hourly {
            hourly,
            daily_uniques,
            total_unique_customers,
        } => {
            if let Some(h) = hourly.iter().find(|h| !known.contains(&h.zone_id)) {
                return Err(CoreError::InvalidZone(format!(
                    "zone {} does not belong to store {store_id}",
                    h.zone_id
                )));
            }
            let hourly = normalize_hourly(zones, hourly)?;
            let uniques: DailyUniques = daily_uniques
                .iter()
                .map(|u| ((u.zone_id, u.date), u.unique_visitors))
                .collect();
            (hourly, uniques, total_unique_customers)
        }
    };

    let daily = rollup_daily(&hourly, Some(&uniques));
    let categories: HashMap<Uuid, _> = zones.iter().map(|z| (z.id, z.category)).collect();

    let dates: Vec<NaiveDate> = daily
        .iter()
        .map(|d| d.date)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    let insights = dates
        .into_iter()
        .filter_map(|date| {
            let total = customers.get(&date).copied().unwrap_or_else(|| {
                daily
                    .iter()
                    .filter(|d| d.date == date)
                    .map(|d| d.unique_visitors)
                    .sum()
            });
            derive_daily_insights(store_id, date, &daily, &hourly, total, &categories)
        })
        .collect();

    Ok(StoreResults {
        hourly,
        daily,
        insights,
    })
}

fn customers_from_visits(visits: &[VisitEvent]) -> BTreeMap<NaiveDate, u32> {
    let mut seen: BTreeMap<NaiveDate, HashSet<(Uuid, &str)>> = BTreeMap::new();
    for v in visits {
        seen.entry(v.exited_at.date_naive())
            .or_default()
            .insert((v.camera_id, v.person_id.as_str()));
    }
    seen.into_iter()
        .map(|(date, people)| (date, u32::try_from(people.len()).unwrap_or(u32::MAX)))
        .collect()
}
