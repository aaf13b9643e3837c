//! Database operations for `hourly_heatmaps`, `daily_heatmaps` and the
//! transactional replacement of a store's processing results.

use chrono::{DateTime, NaiveDate, Utc};
use heatmap_core::{DailyHeatmap, DailyInsights, HourlyHeatmap};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{to_i32, to_u32, DbError};

/// Everything one processing run produces for a store.
#[derive(Debug, Clone, Default)]
pub struct StoreResults {
    pub hourly: Vec<HourlyHeatmap>,
    pub daily: Vec<DailyHeatmap>,
    pub insights: Vec<DailyInsights>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct HourlyRow {
    zone_id: Uuid,
    camera_id: Uuid,
    zone_name: String,
    hour_start: DateTime<Utc>,
    visit_count: i32,
    unique_visitors: i32,
    engaged_visits: i32,
    total_dwell_secs: f64,
    avg_dwell_secs: f64,
    crowd_density: f64,
}

impl TryFrom<HourlyRow> for HourlyHeatmap {
    type Error = DbError;

    fn try_from(row: HourlyRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "hourly_heatmaps";
        Ok(HourlyHeatmap {
            zone_id: row.zone_id,
            camera_id: row.camera_id,
            zone_name: row.zone_name,
            hour_start: row.hour_start,
            visit_count: to_u32(TABLE, "visit_count", row.visit_count)?,
            unique_visitors: to_u32(TABLE, "unique_visitors", row.unique_visitors)?,
            engaged_visits: to_u32(TABLE, "engaged_visits", row.engaged_visits)?,
            total_dwell_secs: row.total_dwell_secs,
            avg_dwell_secs: row.avg_dwell_secs,
            crowd_density: row.crowd_density,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DailyRow {
    zone_id: Uuid,
    camera_id: Uuid,
    zone_name: String,
    date: NaiveDate,
    total_visits: i32,
    unique_visitors: i32,
    total_dwell_secs: f64,
    avg_dwell_secs: f64,
    crowd_density: f64,
    max_hourly_crowd: f64,
    peak_hour: i32,
    engagement_rate: f64,
}

impl TryFrom<DailyRow> for DailyHeatmap {
    type Error = DbError;

    fn try_from(row: DailyRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "daily_heatmaps";
        Ok(DailyHeatmap {
            zone_id: row.zone_id,
            camera_id: row.camera_id,
            zone_name: row.zone_name,
            date: row.date,
            total_visits: to_u32(TABLE, "total_visits", row.total_visits)?,
            unique_visitors: to_u32(TABLE, "unique_visitors", row.unique_visitors)?,
            total_dwell_secs: row.total_dwell_secs,
            avg_dwell_secs: row.avg_dwell_secs,
            crowd_density: row.crowd_density,
            max_hourly_crowd: row.max_hourly_crowd,
            peak_hour: to_u32(TABLE, "peak_hour", row.peak_hour)?,
            engagement_rate: row.engagement_rate,
        })
    }
}

/// Replaces every stored result of `store_id` with `results`.
///
/// Runs in one transaction: readers see either the previous run or this one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written then.
pub async fn replace_store_results(
    pool: &PgPool,
    store_id: Uuid,
    results: &StoreResults,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for table in ["hourly_heatmaps", "daily_heatmaps", "daily_insights"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE store_id = $1"))
            .bind(store_id)
            .execute(&mut *tx)
            .await?;
    }

    for h in &results.hourly {
        sqlx::query(
            "INSERT INTO hourly_heatmaps \
                 (store_id, zone_id, camera_id, zone_name, hour_start, visit_count, \
                  unique_visitors, engaged_visits, total_dwell_secs, avg_dwell_secs, crowd_density) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(store_id)
        .bind(h.zone_id)
        .bind(h.camera_id)
        .bind(&h.zone_name)
        .bind(h.hour_start)
        .bind(to_i32("hourly_heatmaps", "visit_count", h.visit_count)?)
        .bind(to_i32("hourly_heatmaps", "unique_visitors", h.unique_visitors)?)
        .bind(to_i32("hourly_heatmaps", "engaged_visits", h.engaged_visits)?)
        .bind(h.total_dwell_secs)
        .bind(h.avg_dwell_secs)
        .bind(h.crowd_density)
        .execute(&mut *tx)
        .await?;
    }

    for d in &results.daily {
        sqlx::query(
            "INSERT INTO daily_heatmaps \
                 (store_id, zone_id, camera_id, zone_name, date, total_visits, unique_visitors, \
                  total_dwell_secs, avg_dwell_secs, crowd_density, max_hourly_crowd, peak_hour, \
                  engagement_rate) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(store_id)
        .bind(d.zone_id)
        .bind(d.camera_id)
        .bind(&d.zone_name)
        .bind(d.date)
        .bind(to_i32("daily_heatmaps", "total_visits", d.total_visits)?)
        .bind(to_i32("daily_heatmaps", "unique_visitors", d.unique_visitors)?)
        .bind(d.total_dwell_secs)
        .bind(d.avg_dwell_secs)
        .bind(d.crowd_density)
        .bind(d.max_hourly_crowd)
        .bind(to_i32("daily_heatmaps", "peak_hour", d.peak_hour)?)
        .bind(d.engagement_rate)
        .execute(&mut *tx)
        .await?;
    }

    for insight in &results.insights {
        sqlx::query(
            "INSERT INTO daily_insights \
                 (store_id, date, total_unique_customers, zones_analyzed, insights) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(store_id)
        .bind(insight.date)
        .bind(to_i32(
            "daily_insights",
            "total_unique_customers",
            insight.total_unique_customers,
        )?)
        .bind(to_i32("daily_insights", "zones_analyzed", insight.zones_analyzed)?)
        .bind(Json(insight))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        %store_id,
        hourly = results.hourly.len(),
        daily = results.daily.len(),
        insights = results.insights.len(),
        "store results replaced"
    );
    Ok(())
}

/// Hourly records for a store, optionally narrowed to one camera.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_hourly_heatmaps(
    pool: &PgPool,
    store_id: Uuid,
    camera_id: Option<Uuid>,
) -> Result<Vec<HourlyHeatmap>, DbError> {
    let rows = sqlx::query_as::<_, HourlyRow>(
        "SELECT zone_id, camera_id, zone_name, hour_start, visit_count, unique_visitors, \
                engaged_visits, total_dwell_secs, avg_dwell_secs, crowd_density \
         FROM hourly_heatmaps \
         WHERE store_id = $1 AND ($2::uuid IS NULL OR camera_id = $2) \
         ORDER BY hour_start, zone_name, zone_id",
    )
    .bind(store_id)
    .bind(camera_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(HourlyHeatmap::try_from).collect()
}

/// Daily records for a store, optionally narrowed to one camera.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_daily_heatmaps(
    pool: &PgPool,
    store_id: Uuid,
    camera_id: Option<Uuid>,
) -> Result<Vec<DailyHeatmap>, DbError> {
    let rows = sqlx::query_as::<_, DailyRow>(
        "SELECT zone_id, camera_id, zone_name, date, total_visits, unique_visitors, \
                total_dwell_secs, avg_dwell_secs, crowd_density, max_hourly_crowd, peak_hour, \
                engagement_rate \
         FROM daily_heatmaps \
         WHERE store_id = $1 AND ($2::uuid IS NULL OR camera_id = $2) \
         ORDER BY date, zone_name, zone_id",
    )
    .bind(store_id)
    .bind(camera_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DailyHeatmap::try_from).collect()
}
