//! Hourly and daily heatmap roll-ups.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::round_to_tenth;
use crate::visits::VisitEvent;
use crate::zones::Zone;

/// Distinct visitors per (zone, calendar day), when known upstream.
pub type DailyUniques = HashMap<(Uuid, NaiveDate), u32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyHeatmap {
    pub zone_id: Uuid,
    pub camera_id: Uuid,
    pub zone_name: String,
    pub hour_start: DateTime<Utc>,
    pub visit_count: u32,
    pub unique_visitors: u32,
    pub engaged_visits: u32,
    pub total_dwell_secs: f64,
    pub avg_dwell_secs: f64,
    /// Visits in the bucket; a single-hour bucket needs no normalisation.
    pub crowd_density: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyHeatmap {
    pub zone_id: Uuid,
    pub camera_id: Uuid,
    pub zone_name: String,
    pub date: NaiveDate,
    pub total_visits: u32,
    pub unique_visitors: u32,
    pub total_dwell_secs: f64,
    pub avg_dwell_secs: f64,
    /// Visits per active hour.
    pub crowd_density: f64,
    pub max_hourly_crowd: f64,
    /// Hour of day (0-23) with the most visits.
    pub peak_hour: u32,
    /// Percentage of visits that met the zone's dwell threshold, one decimal.
    pub engagement_rate: f64,
}

fn hour_bucket(at: DateTime<Utc>) -> DateTime<Utc> {
    let secs = at.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(at)
}

fn average(total: f64, count: u32) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / f64::from(count)
    }
}

fn to_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[derive(Default)]
struct HourAccumulator<'a> {
    visits: u32,
    engaged: u32,
    dwell: f64,
    people: HashSet<&'a str>,
}

/// Buckets visits by zone and the hour they ended in.
///
/// Engagement is judged against each zone's own dwell threshold; the
/// `engaged` flag carried on the event is ignored. Visits for zones not in
/// `zones` are dropped with a warning.
#[must_use]
pub fn rollup_hourly(zones: &[Zone], visits: &[VisitEvent]) -> Vec<HourlyHeatmap> {
    let by_id: HashMap<Uuid, &Zone> = zones.iter().map(|z| (z.id, z)).collect();
    let mut buckets: BTreeMap<(DateTime<Utc>, Uuid), HourAccumulator<'_>> = BTreeMap::new();

    for visit in visits {
        let Some(zone) = by_id.get(&visit.zone_id) else {
            tracing::warn!(zone_id = %visit.zone_id, "visit for unknown zone skipped");
            continue;
        };
        let acc = buckets
            .entry((hour_bucket(visit.exited_at), visit.zone_id))
            .or_default();
        acc.visits += 1;
        acc.dwell += visit.dwell_secs;
        if zone.is_engaged(visit.dwell_secs) {
            acc.engaged += 1;
        }
        acc.people.insert(visit.person_id.as_str());
    }

    buckets
        .into_iter()
        .filter_map(|((hour_start, zone_id), acc)| {
            let zone = by_id.get(&zone_id)?;
            Some(HourlyHeatmap {
                zone_id,
                camera_id: zone.camera_id,
                zone_name: zone.name.clone(),
                hour_start,
                visit_count: acc.visits,
                unique_visitors: to_count(acc.people.len()),
                engaged_visits: acc.engaged,
                total_dwell_secs: acc.dwell,
                avg_dwell_secs: average(acc.dwell, acc.visits),
                crowd_density: f64::from(acc.visits),
            })
        })
        .collect()
}

/// Re-derives display fields of hourly records computed upstream.
///
/// Each record takes its camera and name from the stored zone, its hour is
/// floored to the bucket start, and average dwell and crowd density are
/// recomputed from the counts.
///
/// # Errors
///
/// [`CoreError::InvalidZone`] for a zone not in `zones`, and
/// [`CoreError::InvalidHeatmap`] when engaged or unique counts exceed the
/// visit count, dwell is negative or not finite, or two records share a
/// (zone, hour) key.
pub fn normalize_hourly(
    zones: &[Zone],
    records: Vec<HourlyHeatmap>,
) -> Result<Vec<HourlyHeatmap>, CoreError> {
    let by_id: HashMap<Uuid, &Zone> = zones.iter().map(|z| (z.id, z)).collect();
    let mut seen: HashSet<(Uuid, DateTime<Utc>)> = HashSet::with_capacity(records.len());

    records
        .into_iter()
        .map(|record| {
            let Some(zone) = by_id.get(&record.zone_id) else {
                return Err(CoreError::InvalidZone(format!(
                    "unknown zone {}",
                    record.zone_id
                )));
            };
            let hour_start = hour_bucket(record.hour_start);
            let key = format!("zone {} hour {hour_start}", record.zone_id);

            if record.engaged_visits > record.visit_count {
                return Err(CoreError::InvalidHeatmap(format!(
                    "{key}: {} engaged visits exceed {} visits",
                    record.engaged_visits, record.visit_count
                )));
            }
            if record.unique_visitors > record.visit_count {
                return Err(CoreError::InvalidHeatmap(format!(
                    "{key}: {} unique visitors exceed {} visits",
                    record.unique_visitors, record.visit_count
                )));
            }
            if !record.total_dwell_secs.is_finite() || record.total_dwell_secs < 0.0 {
                return Err(CoreError::InvalidHeatmap(format!(
                    "{key}: total dwell {} is not a non-negative number",
                    record.total_dwell_secs
                )));
            }
            if !seen.insert((record.zone_id, hour_start)) {
                return Err(CoreError::InvalidHeatmap(format!("{key}: duplicate record")));
            }

            Ok(HourlyHeatmap {
                camera_id: zone.camera_id,
                zone_name: zone.name.clone(),
                hour_start,
                avg_dwell_secs: average(record.total_dwell_secs, record.visit_count),
                crowd_density: f64::from(record.visit_count),
                ..record
            })
        })
        .collect()
}

/// Distinct person ids per (zone, day of exit).
#[must_use]
pub fn unique_visitors_by_zone_day(visits: &[VisitEvent]) -> DailyUniques {
    let mut seen: HashMap<(Uuid, NaiveDate), HashSet<&str>> = HashMap::new();
    for visit in visits {
        seen.entry((visit.zone_id, visit.exited_at.date_naive()))
            .or_default()
            .insert(visit.person_id.as_str());
    }
    seen.into_iter()
        .map(|(key, people)| (key, to_count(people.len())))
        .collect()
}

/// Aggregates hourly records into one record per (zone, calendar day).
///
/// Unique visitors come from `uniques` when it has an entry for the zone and
/// day; otherwise the hourly unique counts are summed, which over-counts
/// people who visit in several hours.
#[must_use]
pub fn rollup_daily(hourly: &[HourlyHeatmap], uniques: Option<&DailyUniques>) -> Vec<DailyHeatmap> {
    let mut groups: BTreeMap<(NaiveDate, Uuid), Vec<&HourlyHeatmap>> = BTreeMap::new();
    for record in hourly {
        groups
            .entry((record.hour_start.date_naive(), record.zone_id))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .filter_map(|((date, zone_id), mut records)| {
            records.sort_by_key(|r| r.hour_start);
            let first = *records.first()?;

            let total_visits: u32 = records.iter().map(|r| r.visit_count).sum();
            let engaged: u32 = records.iter().map(|r| r.engaged_visits).sum();
            let total_dwell_secs: f64 = records.iter().map(|r| r.total_dwell_secs).sum();
            let active_hours = to_count(records.len());

            // Strict comparison over hour-sorted records keeps the earliest tie.
            let mut peak = first;
            for &record in &records {
                if record.visit_count > peak.visit_count {
                    peak = record;
                }
            }
            let max_hourly_crowd = records
                .iter()
                .map(|r| r.crowd_density)
                .fold(0.0_f64, f64::max);

            let unique_visitors = uniques
                .and_then(|u| u.get(&(zone_id, date)).copied())
                .unwrap_or_else(|| records.iter().map(|r| r.unique_visitors).sum());

            let engagement_rate = if total_visits == 0 {
                0.0
            } else {
                round_to_tenth(f64::from(engaged) / f64::from(total_visits) * 100.0)
            };

            Some(DailyHeatmap {
                zone_id,
                camera_id: first.camera_id,
                zone_name: first.zone_name.clone(),
                date,
                total_visits,
                unique_visitors,
                total_dwell_secs,
                avg_dwell_secs: average(total_dwell_secs, total_visits),
                crowd_density: average(f64::from(total_visits), active_hours),
                max_hourly_crowd,
                peak_hour: peak.hour_start.hour(),
                engagement_rate,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "aggregate_test.rs"]
mod tests;
