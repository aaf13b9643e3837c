//! Domain core for retail zone heatmaps.
//!
//! Everything in this crate is synchronous and free of I/O apart from
//! environment lookups in [`config`]. The job registry is the only stateful
//! type; the rest are pure functions over owned or borrowed inputs.

pub mod aggregate;
pub mod app_config;
pub mod config;
pub mod error;
pub mod geometry;
pub mod insights;
pub mod intensity;
pub mod jobs;
pub mod visits;
pub mod zones;

pub use aggregate::{
    normalize_hourly, rollup_daily, rollup_hourly, unique_visitors_by_zone_day, DailyHeatmap,
    DailyUniques, HourlyHeatmap,
};
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, CoreError, PolygonError};
pub use geometry::{
    point_in_polygon, transform_to_video, validate_polygon, CanvasPoint, CanvasPolygon,
    CanvasSize, CaptureState, PixelPoint, Resolution, ZoneCapture,
};
pub use insights::{
    derive_daily_insights, narrate, DailyInsights, InsightsConfig, Narrative, ZoneExtreme,
    ZoneInsight,
};
pub use intensity::{
    classify, classify_records, intensity, max_density, Classified, Density, IntensityBand,
};
pub use jobs::{CameraProgress, JobRegistry, JobSnapshot, JobState, JobSummary};
pub use visits::{BoundingBox, TrackedPosition, VisitEvent, VisitTracker};
pub use zones::{
    zone_identifier_from_name, NewZone, Zone, ZoneCategory, ZoneSpec, DEFAULT_ZONE_COLOR,
};

/// Round to one decimal place for display (engagement rates, dwell times).
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
