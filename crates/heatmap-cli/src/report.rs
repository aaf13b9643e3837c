//! Read-only commands that print heatmaps, insights and stores.

use chrono::NaiveDate;
use clap::Subcommand;
use heatmap_client::{HeatmapClient, InsightsReport};
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum HeatmapCommands {
    /// Hourly zone heatmaps
    Hourly {
        #[arg(long)]
        store: Uuid,
        /// Restrict to one camera; intensities are relative to that camera
        #[arg(long)]
        camera: Option<Uuid>,
    },
    /// Daily zone heatmaps
    Daily {
        #[arg(long)]
        store: Uuid,
        #[arg(long)]
        camera: Option<Uuid>,
    },
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        format!("{}...", name.chars().take(width - 3).collect::<String>())
    } else {
        name.to_string()
    }
}

pub(crate) async fn run_hourly(
    client: &HeatmapClient,
    store_id: Uuid,
    camera_id: Option<Uuid>,
) -> anyhow::Result<()> {
    let rows = client.hourly_heatmaps(store_id, camera_id).await?;
    if rows.is_empty() {
        println!("no hourly heatmaps; run `process start` first");
        return Ok(());
    }

    println!(
        "{:<18}{:<22}{:>8}{:>8}{:>10}{:>11}  BAND",
        "HOUR", "ZONE", "VISITS", "UNIQUE", "AVG DWELL", "INTENSITY"
    );
    for row in &rows {
        println!(
            "{:<18}{:<22}{:>8}{:>8}{:>10.1}{:>11.2}  {}",
            row.record.hour_start.format("%Y-%m-%d %H:00"),
            truncate(&row.record.zone_name, 20),
            row.record.visit_count,
            row.record.unique_visitors,
            row.record.avg_dwell_secs,
            row.intensity,
            row.band
        );
    }
    Ok(())
}

pub(crate) async fn run_daily(
    client: &HeatmapClient,
    store_id: Uuid,
    camera_id: Option<Uuid>,
) -> anyhow::Result<()> {
    let rows = client.daily_heatmaps(store_id, camera_id).await?;
    if rows.is_empty() {
        println!("no daily heatmaps; run `process start` first");
        return Ok(());
    }

    println!(
        "{:<12}{:<22}{:>8}{:>8}{:>10}{:>6}{:>9}{:>11}  BAND",
        "DATE", "ZONE", "VISITS", "UNIQUE", "AVG DWELL", "PEAK", "ENGAGED", "INTENSITY"
    );
    for row in &rows {
        println!(
            "{:<12}{:<22}{:>8}{:>8}{:>10.1}{:>6}{:>8.1}%{:>11.2}  {}",
            row.record.date,
            truncate(&row.record.zone_name, 20),
            row.record.total_visits,
            row.record.unique_visitors,
            row.record.avg_dwell_secs,
            row.record.peak_hour,
            row.record.engagement_rate,
            row.intensity,
            row.band
        );
    }
    Ok(())
}

pub(crate) fn render_insights(report: &InsightsReport) -> String {
    let insights = &report.insights;
    let narrative = &report.narrative;
    let mut out = format!("== {} ==\n{}\n", insights.date, narrative.headline);
    out.push_str(&format!(
        "customers: {}  zones: {}  avg dwell: {:.1}s\n",
        insights.total_unique_customers, insights.zones_analyzed, insights.avg_dwell_secs
    ));
    out.push_str(&format!(
        "hottest: {}  coldest: {}\n",
        insights.hottest_zone.zone_name, insights.coldest_zone.zone_name
    ));
    out.push_str(&format!("engagement: {}\n", narrative.store_engagement));
    for rec in &narrative.recommendations {
        out.push_str(&format!("  - {rec}\n"));
    }
    out
}

pub(crate) async fn run_insights(
    client: &HeatmapClient,
    store_id: Uuid,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let reports = client.insights(store_id, date).await?;
    if reports.is_empty() {
        println!("no insights for store {store_id}");
        return Ok(());
    }
    for report in &reports {
        print!("{}", render_insights(report));
    }
    Ok(())
}

pub(crate) async fn run_stores(client: &HeatmapClient) -> anyhow::Result<()> {
    let stores = client.list_stores().await?;
    if stores.is_empty() {
        println!("no stores registered");
        return Ok(());
    }
    println!("{:<38}{:<24}LOCATION", "ID", "NAME");
    for store in &stores {
        println!(
            "{:<38}{:<24}{}",
            store.id,
            truncate(&store.name, 22),
            store.location.as_deref().unwrap_or("\u{2014}")
        );
        for camera in client.list_cameras(store.id).await? {
            let resolution = camera
                .resolution
                .map_or_else(|| "unprobed".to_string(), |r| format!("{}x{}", r.width, r.height));
            println!(
                "    {} {} ({}, {})",
                camera.id, camera.name, resolution, camera.status
            );
        }
    }
    Ok(())
}
