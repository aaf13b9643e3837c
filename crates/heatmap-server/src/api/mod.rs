mod cameras;
mod heatmaps;
mod processing;
mod stores;
mod zones;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use heatmap_core::{AppConfig, CoreError, JobRegistry};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId, REQUEST_ID_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jobs: Arc<JobRegistry>,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" | "invalid_polygon" => StatusCode::BAD_REQUEST,
            "conflict" | "already_processing" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &heatmap_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_core_error(request_id: &str, error: &CoreError) -> ApiError {
    let code = match error {
        CoreError::InvalidPolygon(_) => "invalid_polygon",
        CoreError::InvalidZone(_)
        | CoreError::InvalidHeatmap(_)
        | CoreError::InvalidProgress { .. }
        | CoreError::ProgressRegressed { .. }
        | CoreError::NoCameras(_) => "validation_error",
        CoreError::AlreadyProcessing(_) => "already_processing",
        CoreError::InvalidTransition { .. } => "conflict",
        CoreError::NotFound { .. } => "not_found",
    };
    ApiError::new(request_id, code, error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)])
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/stores",
            get(stores::list_stores).post(stores::create_store),
        )
        .route("/api/v1/stores/{store_id}", get(stores::get_store))
        .route(
            "/api/v1/stores/{store_id}/cameras",
            get(cameras::list_cameras).post(cameras::create_camera),
        )
        .route(
            "/api/v1/cameras/{camera_id}/probe",
            put(cameras::record_probe),
        )
        .route(
            "/api/v1/cameras/{camera_id}/zones",
            get(zones::list_zones).post(zones::create_zone),
        )
        .route("/api/v1/zones/{zone_id}", delete(zones::delete_zone))
        .route(
            "/api/v1/stores/{store_id}/process",
            post(processing::start_processing),
        )
        .route(
            "/api/v1/stores/{store_id}/processing-status",
            get(processing::processing_status),
        )
        .route(
            "/api/v1/stores/{store_id}/process/progress",
            post(processing::report_progress),
        )
        .route(
            "/api/v1/stores/{store_id}/process/complete",
            post(processing::complete_processing),
        )
        .route(
            "/api/v1/stores/{store_id}/process/fail",
            post(processing::fail_processing),
        )
        .route(
            "/api/v1/stores/{store_id}/heatmaps/hourly",
            get(heatmaps::list_hourly),
        )
        .route(
            "/api/v1/stores/{store_id}/heatmaps/daily",
            get(heatmaps::list_daily),
        )
        .route(
            "/api/v1/stores/{store_id}/insights",
            get(heatmaps::list_insights),
        )
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match heatmap_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
