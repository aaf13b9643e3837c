//! Store-level daily insights and the recommendation text built from them.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{DailyHeatmap, HourlyHeatmap};
use crate::round_to_tenth;
use crate::zones::ZoneCategory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightsConfig {
    /// Store average dwell below this reads as quick browsing.
    pub quick_browse_threshold_secs: f64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            quick_browse_threshold_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneInsight {
    pub zone_id: Uuid,
    pub zone_name: String,
    pub category: Option<ZoneCategory>,
    pub total_visits: u32,
    pub unique_visitors: u32,
    pub avg_dwell_secs: f64,
    pub crowd_density: f64,
    pub engagement_rate: f64,
    pub peak_hour: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneExtreme {
    pub zone_id: Uuid,
    pub zone_name: String,
    pub crowd_density: f64,
    pub total_visits: u32,
}

impl From<&DailyHeatmap> for ZoneExtreme {
    fn from(daily: &DailyHeatmap) -> Self {
        Self {
            zone_id: daily.zone_id,
            zone_name: daily.zone_name.clone(),
            crowd_density: daily.crowd_density,
            total_visits: daily.total_visits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInsights {
    pub store_id: Uuid,
    pub date: NaiveDate,
    pub total_unique_customers: u32,
    pub zones_analyzed: usize,
    pub zones: Vec<ZoneInsight>,
    pub hottest_zone: ZoneExtreme,
    pub coldest_zone: ZoneExtreme,
    /// Visit-weighted across all zones.
    pub avg_dwell_secs: f64,
    pub peak_hour: u32,
    pub peak_hour_customers: u32,
}

/// Builds the insights record for `store_id` on `date`.
///
/// Returns `None` when no zone has a daily record for that date.
#[must_use]
pub fn derive_daily_insights(
    store_id: Uuid,
    date: NaiveDate,
    dailies: &[DailyHeatmap],
    hourly: &[HourlyHeatmap],
    total_unique_customers: u32,
    categories: &HashMap<Uuid, ZoneCategory>,
) -> Option<DailyInsights> {
    let mut day: Vec<&DailyHeatmap> = dailies.iter().filter(|d| d.date == date).collect();
    if day.is_empty() {
        return None;
    }
    day.sort_by_key(|d| d.zone_id);

    let hottest = day.iter().copied().reduce(|best, d| {
        let better = d.crowd_density > best.crowd_density
            || (d.crowd_density == best.crowd_density && d.total_visits > best.total_visits);
        if better {
            d
        } else {
            best
        }
    })?;
    let coldest = day.iter().copied().reduce(|best, d| {
        let better = d.crowd_density < best.crowd_density
            || (d.crowd_density == best.crowd_density && d.total_visits < best.total_visits);
        if better {
            d
        } else {
            best
        }
    })?;

    let total_visits: u32 = day.iter().map(|d| d.total_visits).sum();
    let total_dwell: f64 = day.iter().map(|d| d.total_dwell_secs).sum();
    let avg_dwell_secs = if total_visits == 0 {
        0.0
    } else {
        total_dwell / f64::from(total_visits)
    };

    let mut per_hour: BTreeMap<u32, u32> = BTreeMap::new();
    for record in hourly.iter().filter(|h| h.hour_start.date_naive() == date) {
        *per_hour.entry(record.hour_start.hour()).or_default() += record.visit_count;
    }
    let (peak_hour, peak_hour_customers) = per_hour
        .into_iter()
        .fold((0, 0), |best, (hour, count)| {
            if count > best.1 {
                (hour, count)
            } else {
                best
            }
        });

    let zones = day
        .iter()
        .map(|d| ZoneInsight {
            zone_id: d.zone_id,
            zone_name: d.zone_name.clone(),
            category: categories.get(&d.zone_id).copied(),
            total_visits: d.total_visits,
            unique_visitors: d.unique_visitors,
            avg_dwell_secs: round_to_tenth(d.avg_dwell_secs),
            crowd_density: d.crowd_density,
            engagement_rate: round_to_tenth(d.engagement_rate),
            peak_hour: d.peak_hour,
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        %store_id,
        %date,
        zones = zones.len(),
        hottest = %hottest.zone_name,
        coldest = %coldest.zone_name,
        "daily insights derived"
    );

    Some(DailyInsights {
        store_id,
        date,
        total_unique_customers,
        zones_analyzed: zones.len(),
        zones,
        hottest_zone: hottest.into(),
        coldest_zone: coldest.into(),
        avg_dwell_secs,
        peak_hour,
        peak_hour_customers,
    })
}

/// Human-readable summary and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub headline: String,
    pub store_engagement: String,
    pub quick_browsing: bool,
    pub recommendations: Vec<String>,
}

#[must_use]
pub fn narrate(insights: &DailyInsights, config: &InsightsConfig) -> Narrative {
    let avg = round_to_tenth(insights.avg_dwell_secs);
    let quick_browsing = insights.avg_dwell_secs < config.quick_browse_threshold_secs;
    let store_engagement = if quick_browsing {
        format!(
            "Average dwell time of {avg}s indicates quick browsing - consider improving product visibility."
        )
    } else {
        format!("Average dwell time of {avg}s indicates good engagement - maintain current layout.")
    };

    let mut recommendations = vec![format!(
        "{}: High engagement zone. Consider expanding product selection or using for promotions.",
        insights.hottest_zone.zone_name
    )];
    if insights.coldest_zone.zone_id != insights.hottest_zone.zone_id {
        recommendations.push(format!(
            "{}: Low traffic area. Consider improving visibility, signage, or relocating products.",
            insights.coldest_zone.zone_name
        ));
    }
    if insights.peak_hour_customers > 0 {
        recommendations.push(format!(
            "Ensure adequate staff during {}:00 - {}:00 when {} customers are active",
            insights.peak_hour,
            (insights.peak_hour + 1) % 24,
            insights.peak_hour_customers
        ));
    }

    Narrative {
        headline: format!(
            "{} zones analyzed, {} unique customers on {}",
            insights.zones_analyzed, insights.total_unique_customers, insights.date
        ),
        store_engagement,
        quick_browsing,
        recommendations,
    }
}

#[cfg(test)]
#[path = "insights_test.rs"]
mod tests;
