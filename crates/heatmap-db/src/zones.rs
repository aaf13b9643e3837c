//! Database operations for the `zones` table.
//!
//! Polygons are stored as JSONB `[[x, y], ...]` arrays in the owning camera's
//! pixel grid. Rows are re-validated on the way out so a hand-edited row
//! cannot reach the analytics code.

use chrono::{DateTime, Utc};
use heatmap_core::{validate_polygon, PixelPoint, Zone, ZoneSpec};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{to_i32, to_u32, DbError};

const ZONE_COLUMNS: &str = "z.id, z.camera_id, z.zone_identifier, z.name, z.polygon, \
     z.category, z.color, z.min_dwell_secs, z.created_at";

/// A row from the `zones` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ZoneRow {
    pub id: Uuid,
    pub camera_id: Uuid,
    pub zone_identifier: String,
    pub name: String,
    pub polygon: Json<Vec<PixelPoint>>,
    pub category: String,
    pub color: String,
    pub min_dwell_secs: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ZoneRow> for Zone {
    type Error = DbError;

    fn try_from(row: ZoneRow) -> Result<Self, Self::Error> {
        let polygon = row.polygon.0;
        validate_polygon(&polygon)?;
        let category = row.category.parse().map_err(|e| DbError::InvalidRow {
            table: "zones",
            column: "category",
            reason: format!("{e}"),
        })?;
        Ok(Zone {
            id: row.id,
            camera_id: row.camera_id,
            zone_identifier: row.zone_identifier,
            name: row.name,
            polygon,
            category,
            color: row.color,
            min_dwell_secs: to_u32("zones", "min_dwell_secs", row.min_dwell_secs)?,
            created_at: row.created_at,
        })
    }
}

fn into_zones(rows: Vec<ZoneRow>) -> Result<Vec<Zone>, DbError> {
    rows.into_iter().map(Zone::try_from).collect()
}

/// Persists a validated zone under `camera_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a unique
/// violation when the identifier is already used on this camera.
pub async fn create_zone(pool: &PgPool, camera_id: Uuid, spec: &ZoneSpec) -> Result<Zone, DbError> {
    let row = sqlx::query_as::<_, ZoneRow>(
        "INSERT INTO zones AS z \
             (id, camera_id, zone_identifier, name, polygon, category, color, min_dwell_secs) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING z.id, z.camera_id, z.zone_identifier, z.name, z.polygon, \
                   z.category, z.color, z.min_dwell_secs, z.created_at",
    )
    .bind(Uuid::new_v4())
    .bind(camera_id)
    .bind(&spec.zone_identifier)
    .bind(&spec.name)
    .bind(Json(&spec.polygon))
    .bind(spec.category.as_str())
    .bind(&spec.color)
    .bind(to_i32("zones", "min_dwell_secs", spec.min_dwell_secs)?)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        %camera_id,
        zone_id = %row.id,
        identifier = %row.zone_identifier,
        vertices = spec.polygon.len(),
        "zone created"
    );
    Zone::try_from(row)
}

/// Returns a zone by id, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or a validation error if
/// the stored row is malformed.
pub async fn get_zone(pool: &PgPool, id: Uuid) -> Result<Option<Zone>, DbError> {
    let row = sqlx::query_as::<_, ZoneRow>(&format!(
        "SELECT {ZONE_COLUMNS} FROM zones z WHERE z.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Zone::try_from).transpose()
}

/// Returns a camera's zones in creation order, which is also the order used
/// to attribute overlapping zones.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or a validation error if
/// a stored row is malformed.
pub async fn list_zones_for_camera(pool: &PgPool, camera_id: Uuid) -> Result<Vec<Zone>, DbError> {
    let rows = sqlx::query_as::<_, ZoneRow>(&format!(
        "SELECT {ZONE_COLUMNS} FROM zones z WHERE z.camera_id = $1 ORDER BY z.created_at, z.id"
    ))
    .bind(camera_id)
    .fetch_all(pool)
    .await?;

    into_zones(rows)
}

/// Returns every zone of every camera in a store.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or a validation error if
/// a stored row is malformed.
pub async fn list_zones_for_store(pool: &PgPool, store_id: Uuid) -> Result<Vec<Zone>, DbError> {
    let rows = sqlx::query_as::<_, ZoneRow>(&format!(
        "SELECT {ZONE_COLUMNS} FROM zones z \
         JOIN cameras c ON c.id = z.camera_id \
         WHERE c.store_id = $1 \
         ORDER BY z.camera_id, z.created_at, z.id"
    ))
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    into_zones(rows)
}

/// Deletes a zone. Its heatmap rows go with it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no zone has that id.
pub async fn delete_zone(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM zones WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    tracing::info!(zone_id = %id, "zone deleted");
    Ok(())
}
