//! Zone polygon capture, validation and canvas-to-video transform.
//!
//! Operators draw zones on a fixed-size drawing surface ("canvas space").
//! Persisted zones live in the camera's native pixel grid ("video space"),
//! which is what the detection pipeline tests visitor positions against.
//!
//! Coordinates are scaled independently on each axis and rounded half away
//! from zero (`f64::round`). Canvas coordinates are never negative, so this is
//! the same as round-half-up for every accepted input.

use serde::{Deserialize, Serialize};

use crate::error::PolygonError;

/// Areas at or below this are treated as degenerate.
const AREA_EPSILON: f64 = 1e-9;
/// Tolerance for the on-edge test when the probe point is fractional.
const COLLINEAR_EPSILON: f64 = 1e-9;

/// A point on the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

impl From<[f64; 2]> for CanvasPoint {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<CanvasPoint> for [f64; 2] {
    fn from(p: CanvasPoint) -> Self {
        [p.x, p.y]
    }
}

/// A vertex in the camera's native pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl From<[i32; 2]> for PixelPoint {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<PixelPoint> for [i32; 2] {
    fn from(p: PixelPoint) -> Self {
        [p.x, p.y]
    }
}

/// Anything usable as a polygon vertex.
pub trait Vertex: Copy {
    fn xy(self) -> (f64, f64);
}

impl Vertex for CanvasPoint {
    fn xy(self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl Vertex for PixelPoint {
    fn xy(self) -> (f64, f64) {
        (f64::from(self.x), f64::from(self.y))
    }
}

/// Size of the drawing surface in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    /// # Errors
    ///
    /// Returns [`PolygonError::InvalidDimensions`] unless both sides are
    /// positive and finite.
    pub fn new(width: f64, height: f64) -> Result<Self, PolygonError> {
        let size = Self { width, height };
        size.check()?;
        Ok(size)
    }

    fn check(self) -> Result<(), PolygonError> {
        check_dimensions(self.width, self.height)
    }

    fn contains(self, point: CanvasPoint) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

/// Native resolution of a camera's video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Builds a resolution from the optional probe fields stored on a camera.
    ///
    /// Both sides must be known and positive; anything else means "unknown".
    #[must_use]
    pub fn from_probe(width: Option<i32>, height: Option<i32>) -> Option<Self> {
        let width = u32::try_from(width?).ok().filter(|w| *w > 0)?;
        let height = u32::try_from(height?).ok().filter(|h| *h > 0)?;
        Some(Self { width, height })
    }
}

fn check_dimensions(width: f64, height: f64) -> Result<(), PolygonError> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(PolygonError::InvalidDimensions { width, height })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Open,
    Closed,
}

/// A validated polygon in canvas space, together with the canvas it was drawn on.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasPolygon {
    canvas: CanvasSize,
    points: Vec<CanvasPoint>,
}

impl CanvasPolygon {
    /// Validates `points` against `canvas` without going through a capture session.
    ///
    /// # Errors
    ///
    /// Returns a [`PolygonError`] if the canvas is invalid, a point lies off
    /// the canvas, or the polygon fails [`validate_polygon`].
    pub fn new(canvas: CanvasSize, points: Vec<CanvasPoint>) -> Result<Self, PolygonError> {
        canvas.check()?;
        if let Some(p) = points.iter().find(|p| !canvas.contains(**p)) {
            return Err(out_of_bounds(*p, canvas));
        }
        validate_polygon(&points)?;
        Ok(Self { canvas, points })
    }

    #[must_use]
    pub fn points(&self) -> &[CanvasPoint] {
        &self.points
    }

    #[must_use]
    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    /// Rescales into video space. See [`transform_to_video`].
    ///
    /// # Errors
    ///
    /// See [`transform_to_video`].
    pub fn to_video(&self, resolution: Option<Resolution>) -> Result<Vec<PixelPoint>, PolygonError> {
        transform_to_video(self, resolution)
    }
}

fn out_of_bounds(p: CanvasPoint, canvas: CanvasSize) -> PolygonError {
    PolygonError::OutOfBounds {
        x: p.x,
        y: p.y,
        width: canvas.width,
        height: canvas.height,
    }
}

/// An in-progress polygon capture on a fixed-size drawing surface.
#[derive(Debug, Clone)]
pub struct ZoneCapture {
    canvas: CanvasSize,
    points: Vec<CanvasPoint>,
    state: CaptureState,
}

impl ZoneCapture {
    #[must_use]
    pub fn new(canvas: CanvasSize) -> Self {
        Self {
            canvas,
            points: Vec::new(),
            state: CaptureState::Open,
        }
    }

    /// Appends a point. Returns `false` when the point repeats the previous
    /// one and was ignored.
    ///
    /// # Errors
    ///
    /// [`PolygonError::CaptureClosed`] once the session is closed, and
    /// [`PolygonError::OutOfBounds`] for points off the canvas.
    pub fn push(&mut self, point: CanvasPoint) -> Result<bool, PolygonError> {
        if self.state == CaptureState::Closed {
            return Err(PolygonError::CaptureClosed);
        }
        if !point.x.is_finite() || !point.y.is_finite() || !self.canvas.contains(point) {
            return Err(out_of_bounds(point, self.canvas));
        }
        if self.points.last() == Some(&point) {
            return Ok(false);
        }
        self.points.push(point);
        Ok(true)
    }

    /// Closes the session and returns the validated polygon.
    ///
    /// On failure the session stays open so the operator can keep drawing or
    /// [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Any [`PolygonError`] from validation, or `CaptureClosed` if the
    /// session was already closed.
    pub fn close(&mut self) -> Result<CanvasPolygon, PolygonError> {
        if self.state == CaptureState::Closed {
            return Err(PolygonError::CaptureClosed);
        }
        let polygon = CanvasPolygon::new(self.canvas, self.points.clone())?;
        self.state = CaptureState::Closed;
        Ok(polygon)
    }

    /// Discards all points and reopens the session.
    pub fn reset(&mut self) {
        self.points.clear();
        self.state = CaptureState::Open;
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    #[must_use]
    pub fn points(&self) -> &[CanvasPoint] {
        &self.points
    }
}

/// Checks the zone polygon invariants.
///
/// A valid polygon has at least three vertices, no vertex equal to the one
/// before it (the last vertex is compared with the first), non-zero signed
/// area, and no intersecting edges other than the shared endpoint of
/// neighbouring edges.
///
/// # Errors
///
/// Returns the first violated invariant as a [`PolygonError`].
pub fn validate_polygon<V: Vertex>(points: &[V]) -> Result<(), PolygonError> {
    let n = points.len();
    if n < 3 {
        return Err(PolygonError::TooFewVertices { count: n });
    }

    let xy: Vec<(f64, f64)> = points.iter().map(|p| p.xy()).collect();

    for i in 0..n {
        let next = (i + 1) % n;
        if xy[i] == xy[next] {
            return Err(PolygonError::DuplicateVertex { index: next });
        }
    }

    if signed_area(&xy).abs() <= AREA_EPSILON {
        return Err(PolygonError::ZeroArea);
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let crosses = if j == i + 1 {
                folds_back(xy[i], xy[j], xy[(j + 1) % n])
            } else if i == 0 && j == n - 1 {
                folds_back(xy[1], xy[0], xy[n - 1])
            } else {
                segments_intersect(xy[i], xy[(i + 1) % n], xy[j], xy[(j + 1) % n])
            };
            if crosses {
                return Err(PolygonError::SelfIntersecting {
                    first: i,
                    second: j,
                });
            }
        }
    }

    Ok(())
}

/// Rescales a canvas polygon into the camera's pixel grid.
///
/// `scale_x = video_width / canvas_width` and `scale_y = video_height /
/// canvas_height`; aspect ratio is not preserved. When the camera resolution
/// is unknown the canvas size is used, which makes the transform a rounding
/// of the captured points. The integer result is validated again because
/// rounding can merge neighbouring vertices.
///
/// # Errors
///
/// Returns [`PolygonError`] if the scaled polygon is no longer valid.
pub fn transform_to_video(
    polygon: &CanvasPolygon,
    resolution: Option<Resolution>,
) -> Result<Vec<PixelPoint>, PolygonError> {
    let canvas = polygon.canvas;
    let (video_width, video_height) = resolution.map_or((canvas.width, canvas.height), |r| {
        (f64::from(r.width), f64::from(r.height))
    });
    check_dimensions(video_width, video_height)?;

    let scale_x = video_width / canvas.width;
    let scale_y = video_height / canvas.height;

    let scaled: Vec<PixelPoint> = polygon
        .points
        .iter()
        .map(|p| PixelPoint {
            x: scale_coordinate(p.x, scale_x),
            y: scale_coordinate(p.y, scale_y),
        })
        .collect();

    validate_polygon(&scaled)?;
    Ok(scaled)
}

#[allow(clippy::cast_possible_truncation)]
fn scale_coordinate(value: f64, scale: f64) -> i32 {
    (value * scale).round() as i32
}

/// Closed-region containment test in video space.
///
/// Points on an edge or vertex count as inside so a visitor standing on a
/// zone boundary is attributed to the zone rather than dropped.
#[must_use]
pub fn point_in_polygon(point: (f64, f64), polygon: &[PixelPoint]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let xy: Vec<(f64, f64)> = polygon.iter().map(|p| p.xy()).collect();
    let (px, py) = point;

    for i in 0..n {
        let a = xy[i];
        let b = xy[(i + 1) % n];
        if orientation(a, b, point).abs() <= COLLINEAR_EPSILON && within_bounds(a, b, point) {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = xy[i];
        let (xj, yj) = xy[j];
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shoelace formula; positive for counter-clockwise rings in a y-up frame.
fn signed_area(xy: &[(f64, f64)]) -> f64 {
    let n = xy.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = xy[i];
            let (x2, y2) = xy[(i + 1) % n];
            x1 * y2 - x2 * y1
        })
        .sum();
    twice / 2.0
}

fn orientation(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
    (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
}

fn within_bounds(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> bool {
    r.0 >= p.0.min(q.0) && r.0 <= p.0.max(q.0) && r.1 >= p.1.min(q.1) && r.1 <= p.1.max(q.1)
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Segment `p1p2` against `p3p4`, touching and collinear overlap included.
fn segments_intersect(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    let d1 = sign(orientation(p3, p4, p1));
    let d2 = sign(orientation(p3, p4, p2));
    let d3 = sign(orientation(p1, p2, p3));
    let d4 = sign(orientation(p1, p2, p4));

    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }

    (d1 == 0 && within_bounds(p3, p4, p1))
        || (d2 == 0 && within_bounds(p3, p4, p2))
        || (d3 == 0 && within_bounds(p1, p2, p3))
        || (d4 == 0 && within_bounds(p1, p2, p4))
}

/// Neighbouring edges `a-shared` and `shared-b` overlap when they are
/// collinear and point the same way out of the shared vertex.
fn folds_back(a: (f64, f64), shared: (f64, f64), b: (f64, f64)) -> bool {
    if sign(orientation(a, shared, b)) != 0 {
        return false;
    }
    let dot = (a.0 - shared.0) * (b.0 - shared.0) + (a.1 - shared.1) * (b.1 - shared.1);
    dot > 0.0
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod tests;
