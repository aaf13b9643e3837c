//! Response shapes specific to the REST surface.
//!
//! Domain records (`JobSnapshot`, `Classified<HourlyHeatmap>`, ...) are
//! deserialized straight into the `heatmap-core` types.

use chrono::{DateTime, Utc};
use heatmap_core::{DailyInsights, Narrative, Resolution};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Success envelope: `{ "data": ..., "meta": ... }`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// Error envelope: `{ "error": { "code", "message" }, "meta": ... }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSummary {
    pub id: Uuid,
    pub store_id: Uuid,
    pub camera_identifier: String,
    pub name: String,
    pub video_source: String,
    pub resolution: Option<Resolution>,
    pub fps: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One day of store insights with its rendered narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsReport {
    #[serde(flatten)]
    pub insights: DailyInsights,
    pub narrative: Narrative,
}
