use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::body::{to_bytes, Body};
use axum::http::Request;
use heatmap_core::{Environment, PolygonError};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use super::*;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        log_level: "info".to_string(),
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        canvas_width: 640,
        canvas_height: 480,
        quick_browse_threshold_secs: 10.0,
        default_min_dwell_secs: 5,
        poll_interval_ms: 2000,
        client_max_retries: 3,
        client_retry_backoff_base_ms: 500,
        client_request_timeout_secs: 30,
    }
}

fn test_app(pool: sqlx::PgPool) -> Router {
    build_app(AppState {
        pool,
        jobs: Arc::new(JobRegistry::new()),
        config: Arc::new(test_config()),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json parse")
    };
    (status, json)
}

/// Creates a store with one 1280x720 camera and one zone; returns their ids.
async fn seed_store(app: &Router) -> (String, String, String) {
    let (status, store) = send(
        app,
        "POST",
        "/api/v1/stores",
        Some(json!({ "name": "Downtown", "location": "Main St" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let store_id = store["data"]["id"].as_str().expect("store id").to_string();

    let (status, camera) = send(
        app,
        "POST",
        &format!("/api/v1/stores/{store_id}/cameras"),
        Some(json!({
            "camera_identifier": "cam-1",
            "name": "Entrance",
            "video_source": "file:///videos/entrance.mp4"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let camera_id = camera["data"]["id"].as_str().expect("camera id").to_string();

    let (status, _) = send(
        app,
        "PUT",
        &format!("/api/v1/cameras/{camera_id}/probe"),
        Some(json!({ "width": 1280, "height": 720, "fps": 25.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, zone) = send(
        app,
        "POST",
        &format!("/api/v1/cameras/{camera_id}/zones"),
        Some(json!({
            "name": "Snack Shelf",
            "category": "shelf",
            "canvas_points": [[100, 100], [300, 100], [300, 300], [100, 300]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{zone}");
    let zone_id = zone["data"]["id"].as_str().expect("zone id").to_string();

    (store_id, camera_id, zone_id)
}

// ---------------------------------------------------------------------------
// Error envelope (no DB)
// ---------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("invalid_polygon", StatusCode::BAD_REQUEST),
        ("already_processing", StatusCode::CONFLICT),
        ("conflict", StatusCode::CONFLICT),
        ("not_found", StatusCode::NOT_FOUND),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, expected) in cases {
        let response = ApiError::new("req-1", code, "message").into_response();
        assert_eq!(response.status(), expected, "{code}");
    }
}

#[test]
fn core_errors_map_to_api_codes() {
    let store = Uuid::new_v4();
    assert_eq!(
        map_core_error("r", &CoreError::AlreadyProcessing(store)).error.code,
        "already_processing"
    );
    assert_eq!(
        map_core_error("r", &CoreError::InvalidPolygon(PolygonError::ZeroArea))
            .error
            .code,
        "invalid_polygon"
    );
    assert_eq!(
        map_core_error("r", &CoreError::NoCameras(store)).error.code,
        "validation_error"
    );
    assert_eq!(
        map_core_error("r", &CoreError::InvalidHeatmap("duplicate".to_string()))
            .error
            .code,
        "validation_error"
    );
    assert_eq!(
        map_core_error(
            "r",
            &CoreError::InvalidTransition {
                store_id: store,
                job_id: store,
                action: "complete",
                state: "completed",
            }
        )
        .error
        .code,
        "conflict"
    );
}

// ---------------------------------------------------------------------------
// Routes (DB-backed)
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn request_id_is_echoed(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .header(REQUEST_ID_HEADER, "trace-me")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some("trace-me")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn canvas_zone_is_stored_in_video_space(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (_, camera_id, _) = seed_store(&app).await;

    let (status, zones) = send(&app, "GET", &format!("/api/v1/cameras/{camera_id}/zones"), None).await;
    assert_eq!(status, StatusCode::OK);
    let zone = &zones["data"][0];
    assert_eq!(zone["zone_identifier"], "snack_shelf");
    assert_eq!(zone["color"], "#FF5733");
    // 1280/640 = 2 and 720/480 = 1.5
    assert_eq!(
        zone["polygon"],
        json!([[200, 150], [600, 150], [600, 450], [200, 450]])
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn degenerate_zone_is_invalid_polygon(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (_, camera_id, _) = seed_store(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/cameras/{camera_id}/zones"),
        Some(json!({
            "name": "Line",
            "category": "aisle",
            "polygon": [[0, 0], [50, 50], [100, 100]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_polygon");
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_zone_identifier_conflicts(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (_, camera_id, _) = seed_store(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/cameras/{camera_id}/zones"),
        Some(json!({
            "name": "snack   shelf",
            "category": "shelf",
            "polygon": [[0, 0], [50, 0], [50, 50]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[sqlx::test(migrations = "../../migrations")]
async fn delete_zone_then_404(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (_, _, zone_id) = seed_store(&app).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/zones/{zone_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "DELETE", &format!("/api/v1/zones/{zone_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn status_of_unknown_store_is_404(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/stores/{}/processing-status", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn store_without_cameras_cannot_process(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (_, store) = send(&app, "POST", "/api/v1/stores", Some(json!({ "name": "Empty" }))).await;
    let store_id = store["data"]["id"].as_str().expect("store id");

    let (status, body) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (_, status_body) = send(
        &app,
        "GET",
        &format!("/api/v1/stores/{store_id}/processing-status"),
        None,
    )
    .await;
    assert_eq!(status_body["data"]["status"], "not_started");
}

#[sqlx::test(migrations = "../../migrations")]
async fn processing_lifecycle_produces_heatmaps_and_insights(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (store_id, camera_id, zone_id) = seed_store(&app).await;

    let (status, started) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started["data"]["status"], "processing");
    let job_id = started["data"]["job_id"].as_str().expect("job id").to_string();

    let (status, body) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "already_processing");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/progress"),
        Some(json!({
            "job_id": job_id,
            "progress": { (camera_id.as_str()): { "name": "Entrance", "progress": 50.0 } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/progress"),
        Some(json!({
            "job_id": job_id,
            "progress": { (camera_id.as_str()): { "name": "Entrance", "progress": 20.0 } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let visit = |person: &str, dwell: f64, exited_at: &str| {
        json!({
            "zone_id": zone_id,
            "camera_id": camera_id,
            "person_id": person,
            "entered_at": exited_at,
            "exited_at": exited_at,
            "dwell_secs": dwell,
            "engaged": dwell >= 5.0
        })
    };
    let (status, completed) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/complete"),
        Some(json!({
            "job_id": job_id,
            "results": {
                "source": "visits",
                "visits": [
                    visit("p1", 12.0, "2025-03-01T10:05:00Z"),
                    visit("p2", 3.0, "2025-03-01T10:20:00Z"),
                    visit("p3", 8.0, "2025-03-01T11:00:00Z")
                ]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{completed}");
    assert_eq!(completed["data"]["status"], "completed");
    assert_eq!(completed["data"]["result"]["hourly_heatmaps"], 2);
    assert_eq!(completed["data"]["result"]["daily_heatmaps"], 1);
    assert_eq!(completed["data"]["result"]["insights_generated"], 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/fail"),
        Some(json!({ "job_id": job_id, "message": "late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, hourly) = send(
        &app,
        "GET",
        &format!("/api/v1/stores/{store_id}/heatmaps/hourly?camera_id={camera_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = hourly["data"].as_array().expect("hourly rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["band"], "very_high");
    assert_eq!(rows[1]["band"], "medium");

    let (status, daily) = send(
        &app,
        "GET",
        &format!("/api/v1/stores/{store_id}/heatmaps/daily"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(daily["data"][0]["peak_hour"], 10);
    assert_eq!(daily["data"][0]["engagement_rate"], 66.7);

    let (status, insights) = send(
        &app,
        "GET",
        &format!("/api/v1/stores/{store_id}/insights?date=2025-03-01"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let item = &insights["data"][0];
    assert_eq!(item["total_unique_customers"], 3);
    assert_eq!(item["hottest_zone"]["zone_name"], "Snack Shelf");
    assert_eq!(item["narrative"]["quick_browsing"], true);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_job_can_restart(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (store_id, _, _) = seed_store(&app).await;

    let (_, started) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    let job_id = started["data"]["job_id"].as_str().expect("job id").to_string();

    let (status, failed) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/fail"),
        Some(json!({ "job_id": job_id, "message": "video unreadable" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["data"]["status"], "error");
    assert_eq!(failed["data"]["message"], "video unreadable");

    let (status, restarted) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_ne!(restarted["data"]["job_id"], started["data"]["job_id"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn heatmaps_for_foreign_camera_are_404(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (store_id, _, _) = seed_store(&app).await;
    let (status, _) = send(
        &app,
        "GET",
        &format!(
            "/api/v1/stores/{store_id}/heatmaps/daily?camera_id={}",
            Uuid::new_v4()
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn inconsistent_hourly_results_are_400_and_job_keeps_processing(pool: sqlx::PgPool) {
    let app = test_app(pool);
    let (store_id, camera_id, zone_id) = seed_store(&app).await;
    let (_, started) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    let job_id = started["data"]["job_id"].as_str().expect("job id").to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/complete"),
        Some(json!({
            "job_id": job_id,
            "results": {
                "source": "hourly",
                "hourly": [{
                    "zone_id": zone_id,
                    "camera_id": camera_id,
                    "zone_name": "Snack Shelf",
                    "hour_start": "2025-03-01T09:00:00Z",
                    "visit_count": 10,
                    "unique_visitors": 8,
                    "engaged_visits": 15,
                    "total_dwell_secs": 120.0,
                    "avg_dwell_secs": 12.0,
                    "crowd_density": 10.0
                }],
                "daily_uniques": [],
                "total_unique_customers": {}
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"]["code"], "validation_error");

    let (_, current) = send(&app, "GET", &format!("/api/v1/stores/{store_id}/processing-status"), None).await;
    assert_eq!(current["data"]["status"], "processing");
}

#[sqlx::test(migrations = "../../migrations")]
async fn fail_while_results_are_being_stored_is_409(pool: sqlx::PgPool) {
    let jobs = Arc::new(JobRegistry::new());
    let app = build_app(AppState {
        pool,
        jobs: Arc::clone(&jobs),
        config: Arc::new(test_config()),
    });
    let (store_id, _, _) = seed_store(&app).await;
    let (_, started) = send(&app, "POST", &format!("/api/v1/stores/{store_id}/process"), None).await;
    let job_id = started["data"]["job_id"].as_str().expect("job id").to_string();

    jobs.begin_finalize(
        store_id.parse().expect("store uuid"),
        job_id.parse().expect("job uuid"),
    )
    .expect("claim");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/fail"),
        Some(json!({ "job_id": job_id, "message": "camera offline" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/stores/{store_id}/process/complete"),
        Some(json!({
            "job_id": job_id,
            "results": { "source": "visits", "visits": [] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, current) = send(&app, "GET", &format!("/api/v1/stores/{store_id}/processing-status"), None).await;
    assert_eq!(current["data"]["status"], "processing");
    assert_eq!(current["data"]["message"], "Storing results");
}
