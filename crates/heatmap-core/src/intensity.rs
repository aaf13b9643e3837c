//! Relative intensity bands for rendering heatmaps.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{DailyHeatmap, HourlyHeatmap};

/// Floor for the normalising maximum so an all-zero view divides safely.
pub const DENSITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityBand {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl IntensityBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IntensityBand::VeryLow => "very_low",
            IntensityBand::Low => "low",
            IntensityBand::Medium => "medium",
            IntensityBand::High => "high",
            IntensityBand::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for IntensityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Largest finite density in the view; 0 when the view is empty.
pub fn max_density(densities: impl IntoIterator<Item = f64>) -> f64 {
    densities
        .into_iter()
        .filter(|d| d.is_finite())
        .fold(0.0, f64::max)
}

/// `density / max`, clamped to `[0, 1]`. Non-finite input scores 0.
#[must_use]
pub fn intensity(density: f64, max_density: f64) -> f64 {
    if !density.is_finite() || !max_density.is_finite() {
        return 0.0;
    }
    (density / max_density.max(DENSITY_EPSILON)).clamp(0.0, 1.0)
}

#[must_use]
pub fn classify(intensity: f64) -> IntensityBand {
    match intensity {
        i if !i.is_finite() || i < 0.2 => IntensityBand::VeryLow,
        i if i < 0.4 => IntensityBand::Low,
        i if i < 0.6 => IntensityBand::Medium,
        i if i < 0.8 => IntensityBand::High,
        _ => IntensityBand::VeryHigh,
    }
}

/// Records that can be placed on a heatmap.
pub trait Density {
    fn density(&self) -> f64;
    fn camera_id(&self) -> Uuid;
}

impl Density for HourlyHeatmap {
    fn density(&self) -> f64 {
        self.crowd_density
    }

    fn camera_id(&self) -> Uuid {
        self.camera_id
    }
}

impl Density for DailyHeatmap {
    fn density(&self) -> f64 {
        self.crowd_density
    }

    fn camera_id(&self) -> Uuid {
        self.camera_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classified<T> {
    #[serde(flatten)]
    pub record: T,
    pub intensity: f64,
    pub band: IntensityBand,
}

/// Filters to `camera_id` (if any) and classifies against the filtered view's
/// own maximum, so a quiet camera is not washed out by a busy one.
#[must_use]
pub fn classify_records<T: Density + Clone>(
    records: &[T],
    camera_id: Option<Uuid>,
) -> Vec<Classified<T>> {
    let view: Vec<&T> = records
        .iter()
        .filter(|r| camera_id.is_none_or(|id| r.camera_id() == id))
        .collect();
    let max = max_density(view.iter().map(|r| r.density()));
    view.into_iter()
        .map(|record| {
            let value = intensity(record.density(), max);
            Classified {
                record: record.clone(),
                intensity: value,
                band: classify(value),
            }
        })
        .collect()
}
