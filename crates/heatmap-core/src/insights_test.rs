use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

fn midnight() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
}

fn daily(zone: u128, name: &str, density: f64, visits: u32, dwell: f64) -> DailyHeatmap {
    DailyHeatmap {
        zone_id: Uuid::from_u128(zone),
        camera_id: Uuid::from_u128(100),
        zone_name: name.to_string(),
        date: date(),
        total_visits: visits,
        unique_visitors: visits,
        total_dwell_secs: dwell,
        avg_dwell_secs: if visits == 0 {
            0.0
        } else {
            dwell / f64::from(visits)
        },
        crowd_density: density,
        max_hourly_crowd: density,
        peak_hour: 10,
        engagement_rate: 50.0,
    }
}

fn hourly(zone: u128, hour: i64, visits: u32) -> HourlyHeatmap {
    HourlyHeatmap {
        zone_id: Uuid::from_u128(zone),
        camera_id: Uuid::from_u128(100),
        zone_name: format!("Zone {zone}"),
        hour_start: midnight() + Duration::hours(hour),
        visit_count: visits,
        unique_visitors: visits,
        engaged_visits: 0,
        total_dwell_secs: 0.0,
        avg_dwell_secs: 0.0,
        crowd_density: f64::from(visits),
    }
}

fn derive(dailies: &[DailyHeatmap], hourly: &[HourlyHeatmap]) -> DailyInsights {
    derive_daily_insights(
        Uuid::from_u128(7),
        date(),
        dailies,
        hourly,
        42,
        &HashMap::new(),
    )
    .expect("insights")
}

#[test]
fn hottest_tie_breaks_on_total_visits() {
    let dailies = vec![
        daily(1, "Snacks", 5.0, 20, 100.0),
        daily(2, "Drinks", 5.0, 30, 100.0),
        daily(3, "Back", 1.0, 4, 10.0),
    ];
    let insights = derive(&dailies, &[]);
    assert_eq!(insights.hottest_zone.zone_name, "Drinks");
    assert_eq!(insights.coldest_zone.zone_name, "Back");
    assert_eq!(insights.zones_analyzed, 3);
    assert_eq!(insights.total_unique_customers, 42);
}

#[test]
fn coldest_tie_breaks_on_fewer_visits_then_zone_id() {
    let dailies = vec![
        daily(3, "C", 2.0, 8, 0.0),
        daily(2, "B", 2.0, 8, 0.0),
        daily(1, "A", 2.0, 9, 0.0),
    ];
    let insights = derive(&dailies, &[]);
    assert_eq!(insights.coldest_zone.zone_name, "B");
    assert_eq!(insights.hottest_zone.zone_name, "A");
}

#[test]
fn average_dwell_is_visit_weighted() {
    let dailies = vec![
        daily(1, "Busy", 5.0, 30, 300.0),
        daily(2, "Quiet", 1.0, 10, 300.0),
    ];
    let insights = derive(&dailies, &[]);
    assert!((insights.avg_dwell_secs - 15.0).abs() < 1e-9);
}

#[test]
fn store_peak_hour_sums_zones_and_prefers_earliest() {
    let dailies = vec![daily(1, "A", 1.0, 1, 0.0), daily(2, "B", 1.0, 1, 0.0)];
    let hourly = vec![
        hourly(1, 9, 4),
        hourly(2, 9, 3),
        hourly(1, 14, 7),
        hourly(2, 16, 2),
    ];
    let insights = derive(&dailies, &hourly);
    assert_eq!(insights.peak_hour, 9);
    assert_eq!(insights.peak_hour_customers, 7);
}

#[test]
fn other_dates_are_ignored() {
    let mut other = daily(1, "A", 9.0, 90, 0.0);
    other.date = date().succ_opt().unwrap();
    assert!(derive_daily_insights(
        Uuid::nil(),
        date(),
        &[other],
        &[],
        0,
        &HashMap::new()
    )
    .is_none());
}

#[test]
fn zone_insights_carry_category() {
    let mut categories = HashMap::new();
    categories.insert(Uuid::from_u128(1), ZoneCategory::Counter);
    let insights = derive_daily_insights(
        Uuid::nil(),
        date(),
        &[daily(1, "Till", 3.0, 9, 27.0)],
        &[],
        9,
        &categories,
    )
    .expect("insights");
    assert_eq!(insights.zones[0].category, Some(ZoneCategory::Counter));
    assert!((insights.zones[0].avg_dwell_secs - 3.0).abs() < 1e-9);
}

#[test]
fn narrative_flags_quick_browsing_below_threshold() {
    let dailies = vec![daily(1, "Snacks", 4.0, 10, 60.0), daily(2, "Back", 1.0, 2, 4.0)];
    let insights = derive(&dailies, &[hourly(1, 17, 6)]);
    let narrative = narrate(&insights, &InsightsConfig::default());

    assert!(narrative.quick_browsing);
    assert!(narrative.store_engagement.contains("quick browsing"));
    assert_eq!(narrative.recommendations.len(), 3);
    assert!(narrative.recommendations[0].starts_with("Snacks: High engagement zone."));
    assert!(narrative.recommendations[1].starts_with("Back: Low traffic area."));
    assert_eq!(
        narrative.recommendations[2],
        "Ensure adequate staff during 17:00 - 18:00 when 6 customers are active"
    );
}

#[test]
fn narrative_reports_good_engagement_at_threshold() {
    let insights = derive(&[daily(1, "Only", 2.0, 4, 40.0)], &[]);
    let narrative = narrate(&insights, &InsightsConfig::default());
    assert!(!narrative.quick_browsing);
    assert!(narrative.store_engagement.contains("good engagement"));
    // A single zone is both hottest and coldest; no staffing line without hourly data.
    assert_eq!(narrative.recommendations.len(), 1);
}

#[test]
fn narrative_threshold_is_configurable() {
    let insights = derive(&[daily(1, "Only", 2.0, 4, 40.0)], &[]);
    let strict = InsightsConfig {
        quick_browse_threshold_secs: 12.0,
    };
    assert!(narrate(&insights, &strict).quick_browsing);
}
