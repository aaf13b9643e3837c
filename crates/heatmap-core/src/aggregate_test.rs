use chrono::{Duration, TimeZone};

use super::*;
use crate::geometry::PixelPoint;
use crate::zones::ZoneCategory;

fn day_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

fn zone(id: u128, name: &str) -> Zone {
    Zone {
        id: Uuid::from_u128(id),
        camera_id: Uuid::from_u128(100),
        zone_identifier: name.to_lowercase(),
        name: name.to_string(),
        polygon: vec![
            PixelPoint { x: 0, y: 0 },
            PixelPoint { x: 10, y: 0 },
            PixelPoint { x: 0, y: 10 },
        ],
        category: ZoneCategory::Shelf,
        color: "#FF5733".to_string(),
        min_dwell_secs: 5,
        created_at: day_start(),
    }
}

fn visit(zone_id: u128, person: &str, exit_offset_mins: i64, dwell_secs: f64) -> VisitEvent {
    let exited_at = day_start() + Duration::minutes(exit_offset_mins);
    VisitEvent {
        zone_id: Uuid::from_u128(zone_id),
        camera_id: Uuid::from_u128(100),
        person_id: person.to_string(),
        entered_at: exited_at - Duration::milliseconds((dwell_secs * 1000.0) as i64),
        exited_at,
        dwell_secs,
        engaged: dwell_secs >= 5.0,
    }
}

fn hourly(zone_id: u128, hour: i64, visits: u32, engaged: u32) -> HourlyHeatmap {
    HourlyHeatmap {
        zone_id: Uuid::from_u128(zone_id),
        camera_id: Uuid::from_u128(100),
        zone_name: format!("Zone {zone_id}"),
        hour_start: day_start() + Duration::hours(hour),
        visit_count: visits,
        unique_visitors: visits,
        engaged_visits: engaged,
        total_dwell_secs: f64::from(visits) * 4.0,
        avg_dwell_secs: 4.0,
        crowd_density: f64::from(visits),
    }
}

#[test]
fn hourly_rollup_groups_by_zone_and_exit_hour() {
    let zones = vec![zone(1, "Shelf A"), zone(2, "Counter")];
    let visits = vec![
        visit(1, "p1", 10, 6.0),
        visit(1, "p1", 20, 2.0),
        visit(1, "p2", 50, 10.0),
        visit(1, "p3", 70, 3.0),
        visit(2, "p4", 15, 8.0),
    ];
    let records = rollup_hourly(&zones, &visits);
    assert_eq!(records.len(), 3);

    let first = records
        .iter()
        .find(|r| r.zone_id == Uuid::from_u128(1) && r.hour_start == day_start())
        .expect("zone 1 hour 0");
    assert_eq!(first.visit_count, 3);
    assert_eq!(first.unique_visitors, 2);
    assert_eq!(first.engaged_visits, 2);
    assert!((first.total_dwell_secs - 18.0).abs() < 1e-9);
    assert!((first.avg_dwell_secs - 6.0).abs() < 1e-9);
    assert!((first.crowd_density - 3.0).abs() < f64::EPSILON);
    assert_eq!(first.zone_name, "Shelf A");
}

#[test]
fn hourly_engagement_uses_zone_threshold_not_event_flag() {
    let zones = vec![zone(1, "Shelf A")];
    let mut visits: Vec<VisitEvent> = (0..10)
        .map(|i| {
            let mut v = visit(1, &format!("p{i}"), 30, 60.0);
            v.engaged = false;
            v
        })
        .collect();
    let mut short = visit(1, "p10", 40, 1.0);
    short.engaged = true;
    visits.push(short);

    let records = rollup_hourly(&zones, &visits);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].visit_count, 11);
    assert_eq!(records[0].engaged_visits, 10);

    let daily = rollup_daily(&records, None);
    assert!((daily[0].engagement_rate - 90.9).abs() < 1e-9);
}

#[test]
fn hourly_rollup_skips_unknown_zones() {
    let zones = vec![zone(1, "Shelf A")];
    let visits = vec![visit(9, "p1", 10, 6.0)];
    assert!(rollup_hourly(&zones, &visits).is_empty());
}

#[test]
fn daily_peak_hour_and_total_visits() {
    let records = vec![
        hourly(1, 0, 5, 0),
        hourly(1, 1, 3, 0),
        hourly(1, 2, 8, 0),
        hourly(1, 3, 2, 0),
    ];
    let daily = rollup_daily(&records, None);
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].peak_hour, 2);
    assert_eq!(daily[0].total_visits, 18);
    assert!((daily[0].crowd_density - 4.5).abs() < 1e-9);
    assert!((daily[0].max_hourly_crowd - 8.0).abs() < f64::EPSILON);
}

#[test]
fn daily_peak_hour_tie_goes_to_earliest() {
    // Input order is deliberately not chronological.
    let records = vec![hourly(1, 9, 4, 0), hourly(1, 4, 4, 0), hourly(1, 6, 1, 0)];
    let daily = rollup_daily(&records, None);
    assert_eq!(daily[0].peak_hour, 4);
}

#[test]
fn daily_engagement_rate_is_percentage_of_visits() {
    let records = vec![hourly(1, 10, 4, 3), hourly(1, 11, 6, 3)];
    let daily = rollup_daily(&records, None);
    assert!((daily[0].engagement_rate - 60.0).abs() < f64::EPSILON);
}

#[test]
fn daily_engagement_rate_rounds_to_one_decimal() {
    let records = vec![hourly(1, 10, 3, 2)];
    let daily = rollup_daily(&records, None);
    assert!((daily[0].engagement_rate - 66.7).abs() < 1e-9);
}

#[test]
fn daily_uniques_prefer_upstream_counts() {
    let records = vec![hourly(1, 10, 4, 0), hourly(1, 11, 6, 0)];

    let summed = rollup_daily(&records, None);
    assert_eq!(summed[0].unique_visitors, 10);

    let mut uniques = DailyUniques::new();
    uniques.insert((Uuid::from_u128(1), day_start().date_naive()), 7);
    let upstream = rollup_daily(&records, Some(&uniques));
    assert_eq!(upstream[0].unique_visitors, 7);
}

#[test]
fn daily_rollup_emits_nothing_for_empty_input() {
    assert!(rollup_daily(&[], None).is_empty());
}

#[test]
fn daily_rollup_splits_days_and_zones() {
    let records = vec![
        hourly(1, 10, 4, 0),
        hourly(2, 10, 1, 0),
        hourly(1, 34, 2, 0),
    ];
    let daily = rollup_daily(&records, None);
    assert_eq!(daily.len(), 3);
    let next_day = daily
        .iter()
        .find(|d| d.date == day_start().date_naive().succ_opt().unwrap())
        .expect("second day");
    assert_eq!(next_day.peak_hour, 10);
    assert_eq!(next_day.total_visits, 2);
}

#[test]
fn unique_visitors_are_distinct_per_zone_and_day() {
    let visits = vec![
        visit(1, "p1", 10, 6.0),
        visit(1, "p1", 200, 6.0),
        visit(1, "p2", 300, 6.0),
        visit(2, "p1", 10, 6.0),
    ];
    let uniques = unique_visitors_by_zone_day(&visits);
    let day = day_start().date_naive();
    assert_eq!(uniques.get(&(Uuid::from_u128(1), day)), Some(&2));
    assert_eq!(uniques.get(&(Uuid::from_u128(2), day)), Some(&1));
}

#[test]
fn normalized_hourly_takes_identity_from_zone_and_rederives_fields() {
    let zones = vec![zone(1, "Shelf A")];
    let mut record = hourly(1, 9, 10, 4);
    record.camera_id = Uuid::from_u128(777);
    record.zone_name = "Spoofed".to_string();
    record.hour_start += Duration::minutes(30);
    record.total_dwell_secs = 50.0;
    record.avg_dwell_secs = 999.0;
    record.crowd_density = 4242.0;

    let records = normalize_hourly(&zones, vec![record]).expect("normalize");
    let r = &records[0];
    assert_eq!(r.camera_id, Uuid::from_u128(100));
    assert_eq!(r.zone_name, "Shelf A");
    assert_eq!(r.hour_start, day_start() + Duration::hours(9));
    assert!((r.avg_dwell_secs - 5.0).abs() < 1e-9);
    assert!((r.crowd_density - 10.0).abs() < f64::EPSILON);
    assert_eq!(r.engaged_visits, 4);

    let daily = rollup_daily(&records, None);
    assert!((daily[0].max_hourly_crowd - 10.0).abs() < f64::EPSILON);
}

#[test]
fn normalized_hourly_rejects_engaged_above_visits() {
    let err = normalize_hourly(&[zone(1, "Shelf A")], vec![hourly(1, 9, 10, 15)]).unwrap_err();
    assert!(matches!(err, CoreError::InvalidHeatmap(_)), "{err}");
}

#[test]
fn normalized_hourly_rejects_uniques_above_visits() {
    let mut record = hourly(1, 9, 3, 1);
    record.unique_visitors = 4;
    let err = normalize_hourly(&[zone(1, "Shelf A")], vec![record]).unwrap_err();
    assert!(matches!(err, CoreError::InvalidHeatmap(_)), "{err}");
}

#[test]
fn normalized_hourly_rejects_non_finite_dwell() {
    let mut record = hourly(1, 9, 3, 1);
    record.total_dwell_secs = f64::NAN;
    let err = normalize_hourly(&[zone(1, "Shelf A")], vec![record]).unwrap_err();
    assert!(matches!(err, CoreError::InvalidHeatmap(_)), "{err}");
}

#[test]
fn normalized_hourly_rejects_duplicate_zone_hour() {
    let mut late = hourly(1, 9, 2, 0);
    late.hour_start += Duration::minutes(45);
    let err = normalize_hourly(&[zone(1, "Shelf A")], vec![hourly(1, 9, 3, 1), late]).unwrap_err();
    assert!(matches!(err, CoreError::InvalidHeatmap(ref m) if m.contains("duplicate")), "{err}");
}

#[test]
fn normalized_hourly_rejects_unknown_zone() {
    let err = normalize_hourly(&[zone(1, "Shelf A")], vec![hourly(2, 9, 3, 1)]).unwrap_err();
    assert!(matches!(err, CoreError::InvalidZone(_)), "{err}");
}
