use thiserror::Error;
use uuid::Uuid;

/// Reasons a captured or persisted polygon is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolygonError {
    #[error("polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },

    #[error("polygon has zero area")]
    ZeroArea,

    #[error("vertex {index} repeats the previous vertex")]
    DuplicateVertex { index: usize },

    #[error("edges {first} and {second} intersect")]
    SelfIntersecting { first: usize, second: usize },

    #[error("point ({x}, {y}) lies outside the {width}x{height} drawing surface")]
    OutOfBounds {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },

    #[error("capture session is closed")]
    CaptureClosed,

    #[error("dimensions must be positive and finite, got {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
}

/// Errors raised by the domain core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid polygon: {0}")]
    InvalidPolygon(#[from] PolygonError),

    #[error("processing already in progress for store {0}")]
    AlreadyProcessing(Uuid),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("job {job_id} for store {store_id} cannot {action} while {state}")]
    InvalidTransition {
        store_id: Uuid,
        job_id: Uuid,
        action: &'static str,
        state: &'static str,
    },

    #[error("progress for camera {camera_id} went from {previous:.1}% to {reported:.1}%")]
    ProgressRegressed {
        camera_id: Uuid,
        previous: f64,
        reported: f64,
    },

    #[error("progress for camera {camera_id} must be within 0-100, got {reported}")]
    InvalidProgress { camera_id: Uuid, reported: f64 },

    #[error("store {0} has no cameras to process")]
    NoCameras(Uuid),

    #[error("invalid zone: {0}")]
    InvalidZone(String),

    #[error("invalid heatmap record: {0}")]
    InvalidHeatmap(String),
}

impl CoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
