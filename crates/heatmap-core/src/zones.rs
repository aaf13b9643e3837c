use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, PolygonError};
use crate::geometry::{point_in_polygon, validate_polygon, PixelPoint, Resolution};

pub const DEFAULT_ZONE_COLOR: &str = "#FF5733";

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneCategory {
    Shelf,
    Counter,
    Entrance,
    Aisle,
}

impl ZoneCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneCategory::Shelf => "shelf",
            ZoneCategory::Counter => "counter",
            ZoneCategory::Entrance => "entrance",
            ZoneCategory::Aisle => "aisle",
        }
    }
}

impl std::fmt::Display for ZoneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ZoneCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shelf" => Ok(ZoneCategory::Shelf),
            "counter" => Ok(ZoneCategory::Counter),
            "entrance" => Ok(ZoneCategory::Entrance),
            "aisle" => Ok(ZoneCategory::Aisle),
            other => Err(CoreError::InvalidZone(format!(
                "unknown zone category '{other}'; expected shelf, counter, entrance or aisle"
            ))),
        }
    }
}

/// A persisted zone. The polygon is in the owning camera's pixel grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub camera_id: Uuid,
    pub zone_identifier: String,
    pub name: String,
    pub polygon: Vec<PixelPoint>,
    pub category: ZoneCategory,
    pub color: String,
    pub min_dwell_secs: u32,
    pub created_at: DateTime<Utc>,
}

impl Zone {
    /// Closed-region containment in video space.
    #[must_use]
    pub fn contains(&self, point: (f64, f64)) -> bool {
        point_in_polygon(point, &self.polygon)
    }

    /// Whether a visit of `dwell_secs` counts as engaged for this zone.
    #[must_use]
    pub fn is_engaged(&self, dwell_secs: f64) -> bool {
        dwell_secs >= f64::from(self.min_dwell_secs)
    }
}

/// Operator input for a new zone, before defaults and validation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewZone {
    pub zone_identifier: Option<String>,
    pub name: String,
    pub polygon: Vec<PixelPoint>,
    pub category: ZoneCategory,
    pub color: Option<String>,
    pub min_dwell_secs: Option<u32>,
}

/// A zone that passed validation and is ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSpec {
    pub zone_identifier: String,
    pub name: String,
    pub polygon: Vec<PixelPoint>,
    pub category: ZoneCategory,
    pub color: String,
    pub min_dwell_secs: u32,
}

impl NewZone {
    /// Applies defaults and checks every zone invariant.
    ///
    /// When `resolution` is known, every vertex must also lie inside the frame.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPolygon`] for geometry problems and
    /// [`CoreError::InvalidZone`] for the remaining fields.
    pub fn validate(
        self,
        resolution: Option<Resolution>,
        default_min_dwell_secs: u32,
    ) -> Result<ZoneSpec, CoreError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::InvalidZone(
                "zone name must be non-empty".to_string(),
            ));
        }

        let zone_identifier = match self.zone_identifier {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => zone_identifier_from_name(&name),
        };

        let color = self
            .color
            .unwrap_or_else(|| DEFAULT_ZONE_COLOR.to_string());
        if !COLOR_RE.is_match(&color) {
            return Err(CoreError::InvalidZone(format!(
                "color '{color}' must be a #RRGGBB hex value"
            )));
        }

        validate_polygon(&self.polygon)?;
        if let Some(frame) = resolution {
            check_within_frame(&self.polygon, frame)?;
        }

        Ok(ZoneSpec {
            zone_identifier,
            name,
            polygon: self.polygon,
            category: self.category,
            color,
            min_dwell_secs: self.min_dwell_secs.unwrap_or(default_min_dwell_secs),
        })
    }
}

fn check_within_frame(polygon: &[PixelPoint], frame: Resolution) -> Result<(), PolygonError> {
    let inside = |p: &PixelPoint| {
        u32::try_from(p.x).is_ok_and(|x| x <= frame.width)
            && u32::try_from(p.y).is_ok_and(|y| y <= frame.height)
    };
    match polygon.iter().find(|p| !inside(p)) {
        Some(p) => Err(PolygonError::OutOfBounds {
            x: f64::from(p.x),
            y: f64::from(p.y),
            width: f64::from(frame.width),
            height: f64::from(frame.height),
        }),
        None => Ok(()),
    }
}

/// Lowercases the name and replaces each whitespace run with `_`.
#[must_use]
pub fn zone_identifier_from_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<PixelPoint> {
        vec![
            PixelPoint { x: 0, y: 0 },
            PixelPoint { x: 100, y: 0 },
            PixelPoint { x: 0, y: 100 },
        ]
    }

    fn new_zone() -> NewZone {
        NewZone {
            zone_identifier: None,
            name: "  Snack Shelf ".to_string(),
            polygon: triangle(),
            category: ZoneCategory::Shelf,
            color: None,
            min_dwell_secs: None,
        }
    }

    #[test]
    fn defaults_are_applied() {
        let spec = new_zone().validate(None, 5).expect("valid zone");
        assert_eq!(spec.name, "Snack Shelf");
        assert_eq!(spec.zone_identifier, "snack_shelf");
        assert_eq!(spec.color, DEFAULT_ZONE_COLOR);
        assert_eq!(spec.min_dwell_secs, 5);
    }

    #[test]
    fn explicit_identifier_and_threshold_win() {
        let mut zone = new_zone();
        zone.zone_identifier = Some("shelf-a".to_string());
        zone.min_dwell_secs = Some(12);
        let spec = zone.validate(None, 5).expect("valid zone");
        assert_eq!(spec.zone_identifier, "shelf-a");
        assert_eq!(spec.min_dwell_secs, 12);
    }

    #[test]
    fn degenerate_polygon_is_invalid_polygon() {
        let mut zone = new_zone();
        zone.polygon.truncate(2);
        let err = zone.validate(None, 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPolygon(PolygonError::TooFewVertices { count: 2 })
        ));
    }

    #[test]
    fn vertex_outside_known_frame_is_rejected() {
        let frame = Resolution {
            width: 64,
            height: 480,
        };
        let err = new_zone().validate(Some(frame), 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPolygon(PolygonError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn bad_color_and_blank_name_are_rejected() {
        let mut zone = new_zone();
        zone.color = Some("red".to_string());
        assert!(matches!(
            zone.validate(None, 5),
            Err(CoreError::InvalidZone(_))
        ));

        let mut zone = new_zone();
        zone.name = "   ".to_string();
        assert!(matches!(
            zone.validate(None, 5),
            Err(CoreError::InvalidZone(_))
        ));
    }

    #[test]
    fn category_parses_and_displays() {
        assert_eq!(
            "entrance".parse::<ZoneCategory>().expect("parse"),
            ZoneCategory::Entrance
        );
        assert_eq!(ZoneCategory::Aisle.to_string(), "aisle");
        assert!("checkout".parse::<ZoneCategory>().is_err());
    }

    #[test]
    fn engagement_threshold_is_inclusive() {
        let zone = Zone {
            id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            zone_identifier: "z".to_string(),
            name: "Z".to_string(),
            polygon: triangle(),
            category: ZoneCategory::Counter,
            color: DEFAULT_ZONE_COLOR.to_string(),
            min_dwell_secs: 5,
            created_at: Utc::now(),
        };
        assert!(zone.is_engaged(5.0));
        assert!(!zone.is_engaged(4.99));
        assert!(zone.contains((0.0, 0.0)));
    }
}
