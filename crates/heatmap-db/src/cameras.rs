//! Database operations for the `cameras` table.

use chrono::{DateTime, Utc};
use heatmap_core::Resolution;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{to_i32, DbError};

const CAMERA_COLUMNS: &str = "id, store_id, camera_identifier, name, video_source, \
     resolution_width, resolution_height, fps, status, created_at";

/// A row from the `cameras` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CameraRow {
    pub id: Uuid,
    pub store_id: Uuid,
    pub camera_identifier: String,
    pub name: String,
    pub video_source: String,
    /// `NULL` until the video has been probed.
    pub resolution_width: Option<i32>,
    pub resolution_height: Option<i32>,
    pub fps: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl CameraRow {
    /// Native frame size, when both sides are known.
    #[must_use]
    pub fn resolution(&self) -> Option<Resolution> {
        Resolution::from_probe(self.resolution_width, self.resolution_height)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Fields needed to register a camera.
#[derive(Debug, Clone, Copy)]
pub struct NewCamera<'a> {
    pub camera_identifier: &'a str,
    pub name: &'a str,
    pub video_source: &'a str,
}

/// Registers a camera under `store_id` with unknown resolution.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a unique
/// violation when the identifier is already taken within the store.
pub async fn create_camera(
    pool: &PgPool,
    store_id: Uuid,
    camera: NewCamera<'_>,
) -> Result<CameraRow, DbError> {
    let row = sqlx::query_as::<_, CameraRow>(&format!(
        "INSERT INTO cameras (id, store_id, camera_identifier, name, video_source) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {CAMERA_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(store_id)
    .bind(camera.camera_identifier)
    .bind(camera.name)
    .bind(camera.video_source)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        %store_id,
        camera_id = %row.id,
        identifier = %row.camera_identifier,
        "camera registered"
    );
    Ok(row)
}

/// Returns a camera by id, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_camera(pool: &PgPool, id: Uuid) -> Result<Option<CameraRow>, DbError> {
    let row = sqlx::query_as::<_, CameraRow>(&format!(
        "SELECT {CAMERA_COLUMNS} FROM cameras WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every camera of a store, ordered by identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cameras_for_store(
    pool: &PgPool,
    store_id: Uuid,
) -> Result<Vec<CameraRow>, DbError> {
    let rows = sqlx::query_as::<_, CameraRow>(&format!(
        "SELECT {CAMERA_COLUMNS} FROM cameras WHERE store_id = $1 ORDER BY camera_identifier"
    ))
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Stores the probed frame size and frame rate of a camera's video.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the camera does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_camera_probe(
    pool: &PgPool,
    id: Uuid,
    resolution: Resolution,
    fps: Option<f64>,
) -> Result<CameraRow, DbError> {
    let row = sqlx::query_as::<_, CameraRow>(&format!(
        "UPDATE cameras \
         SET resolution_width = $2, resolution_height = $3, fps = COALESCE($4, fps) \
         WHERE id = $1 \
         RETURNING {CAMERA_COLUMNS}"
    ))
    .bind(id)
    .bind(to_i32("cameras", "resolution_width", resolution.width)?)
    .bind(to_i32("cameras", "resolution_height", resolution.height)?)
    .bind(fps)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    tracing::info!(
        camera_id = %id,
        width = resolution.width,
        height = resolution.height,
        ?fps,
        "camera probe recorded"
    );
    Ok(row)
}
