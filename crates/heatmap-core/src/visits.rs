//! Turns per-frame tracked positions into completed zone visits.
//!
//! The detector and tracker are external; this module only needs a stable
//! person id and a bounding box per frame. A person is attributed to the
//! first zone (in the order given) whose polygon contains their foot point.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::zones::Zone;

/// Detection box in video pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Horizontal centre of the bottom edge, i.e. where the person stands.
    #[must_use]
    pub fn foot_point(&self) -> (f64, f64) {
        ((self.x_min + self.x_max) / 2.0, self.y_max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub person_id: String,
    pub bbox: BoundingBox,
    pub at: DateTime<Utc>,
}

/// One completed visit of a person to a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitEvent {
    pub zone_id: Uuid,
    pub camera_id: Uuid,
    pub person_id: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: DateTime<Utc>,
    pub dwell_secs: f64,
    /// Dwell met the zone's minimum threshold.
    #[serde(default)]
    pub engaged: bool,
}

#[derive(Debug, Clone)]
struct ActiveVisit {
    zone_index: usize,
    entered_at: DateTime<Utc>,
}

/// Tracks open visits for the zones of a single camera.
#[derive(Debug, Clone)]
pub struct VisitTracker {
    zones: Vec<Zone>,
    active: HashMap<String, ActiveVisit>,
}

impl VisitTracker {
    #[must_use]
    pub fn new(zones: Vec<Zone>) -> Self {
        Self {
            zones,
            active: HashMap::new(),
        }
    }

    /// Number of people currently inside a zone.
    #[must_use]
    pub fn open_visits(&self) -> usize {
        self.active.len()
    }

    /// Feeds one observation. Returns the visit that ended, if the person
    /// left the zone they were in.
    pub fn observe(&mut self, position: &TrackedPosition) -> Option<VisitEvent> {
        let foot = position.bbox.foot_point();
        let current = self.zones.iter().position(|z| z.contains(foot));

        let previous = self.active.get(&position.person_id).map(|v| v.zone_index);
        if previous.is_some() && previous == current {
            return None;
        }

        let ended = self
            .active
            .remove(&position.person_id)
            .map(|visit| self.close(&position.person_id, &visit, position.at));

        if let Some(zone_index) = current {
            self.active.insert(
                position.person_id.clone(),
                ActiveVisit {
                    zone_index,
                    entered_at: position.at,
                },
            );
        }

        ended
    }

    /// Ends every open visit at `at`, e.g. when the video finishes.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Vec<VisitEvent> {
        let mut open: Vec<(String, ActiveVisit)> = self.active.drain().collect();
        open.sort_by(|a, b| a.0.cmp(&b.0));
        open.iter()
            .map(|(person_id, visit)| self.close(person_id, visit, at))
            .collect()
    }

    fn close(&self, person_id: &str, visit: &ActiveVisit, at: DateTime<Utc>) -> VisitEvent {
        let zone = &self.zones[visit.zone_index];
        #[allow(clippy::cast_precision_loss)]
        let dwell_secs = ((at - visit.entered_at).num_milliseconds() as f64 / 1000.0).max(0.0);
        let engaged = zone.is_engaged(dwell_secs);
        tracing::debug!(
            zone = %zone.zone_identifier,
            person_id,
            dwell_secs,
            engaged,
            "visit closed"
        );
        VisitEvent {
            zone_id: zone.id,
            camera_id: zone.camera_id,
            person_id: person_id.to_string(),
            entered_at: visit.entered_at,
            exited_at: at,
            dwell_secs,
            engaged,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::geometry::PixelPoint;
    use crate::zones::ZoneCategory;

    fn zone(name: &str, x0: i32, x1: i32, min_dwell_secs: u32) -> Zone {
        Zone {
            id: Uuid::new_v4(),
            camera_id: Uuid::nil(),
            zone_identifier: name.to_string(),
            name: name.to_string(),
            polygon: vec![
                PixelPoint { x: x0, y: 0 },
                PixelPoint { x: x1, y: 0 },
                PixelPoint { x: x1, y: 100 },
                PixelPoint { x: x0, y: 100 },
            ],
            category: ZoneCategory::Aisle,
            color: "#FF5733".to_string(),
            min_dwell_secs,
            created_at: Utc::now(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn seen(person: &str, foot_x: f64, secs: i64) -> TrackedPosition {
        TrackedPosition {
            person_id: person.to_string(),
            bbox: BoundingBox {
                x_min: foot_x - 5.0,
                y_min: 10.0,
                x_max: foot_x + 5.0,
                y_max: 50.0,
            },
            at: at(secs),
        }
    }

    #[test]
    fn moving_between_zones_closes_the_first_visit() {
        let left = zone("left", 0, 100, 5);
        let right = zone("right", 200, 300, 5);
        let left_id = left.id;
        let mut tracker = VisitTracker::new(vec![left, right]);

        assert!(tracker.observe(&seen("p1", 50.0, 0)).is_none());
        assert!(tracker.observe(&seen("p1", 60.0, 4)).is_none());
        let visit = tracker
            .observe(&seen("p1", 250.0, 8))
            .expect("left visit ends");

        assert_eq!(visit.zone_id, left_id);
        assert!((visit.dwell_secs - 8.0).abs() < f64::EPSILON);
        assert!(visit.engaged);
        assert_eq!(tracker.open_visits(), 1);
    }

    #[test]
    fn short_visit_is_not_engaged() {
        let mut tracker = VisitTracker::new(vec![zone("shelf", 0, 100, 5)]);
        tracker.observe(&seen("p1", 50.0, 0));
        let visit = tracker
            .observe(&seen("p1", 150.0, 3))
            .expect("visit ends on leaving");
        assert!(!visit.engaged);
        assert_eq!(tracker.open_visits(), 0);
    }

    #[test]
    fn finish_closes_open_visits() {
        let mut tracker = VisitTracker::new(vec![zone("shelf", 0, 100, 5)]);
        tracker.observe(&seen("b", 10.0, 0));
        tracker.observe(&seen("a", 20.0, 2));
        let visits = tracker.finish(at(12));
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].person_id, "a");
        assert!((visits[0].dwell_secs - 10.0).abs() < f64::EPSILON);
        assert_eq!(tracker.open_visits(), 0);
    }

    #[test]
    fn foot_point_uses_bottom_centre() {
        let bbox = BoundingBox {
            x_min: 10.0,
            y_min: 20.0,
            x_max: 30.0,
            y_max: 80.0,
        };
        assert_eq!(bbox.foot_point(), (20.0, 80.0));
    }
}
