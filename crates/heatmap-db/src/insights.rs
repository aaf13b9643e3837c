//! Reads of the `daily_insights` table. Writes go through
//! [`crate::replace_store_results`].

use chrono::NaiveDate;
use heatmap_core::DailyInsights;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// All insight records of a store, newest day first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or a stored payload does not
/// decode.
pub async fn list_daily_insights(
    pool: &PgPool,
    store_id: Uuid,
) -> Result<Vec<DailyInsights>, DbError> {
    let rows = sqlx::query_scalar::<_, Json<DailyInsights>>(
        "SELECT insights FROM daily_insights WHERE store_id = $1 ORDER BY date DESC",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|Json(insights)| insights).collect())
}

/// The insight record for one day, if that day was processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or the payload does not decode.
pub async fn get_daily_insights(
    pool: &PgPool,
    store_id: Uuid,
    date: NaiveDate,
) -> Result<Option<DailyInsights>, DbError> {
    let row = sqlx::query_scalar::<_, Json<DailyInsights>>(
        "SELECT insights FROM daily_insights WHERE store_id = $1 AND date = $2",
    )
    .bind(store_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|Json(insights)| insights))
}
