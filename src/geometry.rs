//! Region-of-interest geometry.
//!
//! Detection boxes are axis-aligned rectangles in frame pixel coordinates.
//! A region of interest is a simple polygon in the same space. The only
//! question the triage core asks is whether the two shapes share at least
//! one point; touching boundaries count.

use serde::{Deserialize, Serialize};

use crate::error::TriageError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box. `x_min <= x_max` and `y_min <= y_max` always hold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    /// Corners in ring order. Degenerate boxes repeat corners.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_min),
            Point::new(self.x_max, self.y_max),
            Point::new(self.x_min, self.y_max),
        ]
    }

    fn edges(&self) -> [(Point, Point); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
}

/// Region of interest: a simple polygon, implicitly closed.
#[derive(Clone, Debug, PartialEq)]
pub struct Roi {
    vertices: Vec<Point>,
}

impl Roi {
    pub fn new(vertices: Vec<Point>) -> Result<Self, TriageError> {
        if vertices.len() < 3 {
            return Err(TriageError::Config(format!(
                "roi needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(TriageError::Config(
                "roi vertices must be finite".to_string(),
            ));
        }
        Ok(Self { vertices })
    }

    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self, TriageError> {
        Self::new(pairs.iter().map(|[x, y]| Point::new(*x, *y)).collect())
    }

    /// Parse `x,y;x,y;x,y` as used by the environment override.
    pub fn parse(spec: &str) -> Result<Self, TriageError> {
        let mut vertices = Vec::new();
        for pair in spec.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (x, y) = pair.split_once(',').ok_or_else(|| {
                TriageError::Config(format!("roi vertex '{}' is not 'x,y'", pair))
            })?;
            let parse = |v: &str| {
                v.trim().parse::<f64>().map_err(|_| {
                    TriageError::Config(format!("roi coordinate '{}' is not a number", v.trim()))
                })
            };
            vertices.push(Point::new(parse(x)?, parse(y)?));
        }
        Self::new(vertices)
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Closed ring of edges, last vertex back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Point in polygon, boundary inclusive.
    pub fn contains(&self, p: Point) -> bool {
        if self.edges().any(|(a, b)| on_segment(a, b, p)) {
            return true;
        }
        // Even-odd ray cast towards +x.
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// True iff the box and the polygon share at least one point.
///
/// Covers every arrangement: a polygon vertex inside the box, a box corner
/// inside the polygon (box fully contained included), or crossing edges.
/// Zero-width or zero-height boxes degrade to segments or points and go
/// through the same tests.
pub fn intersects(bbox: &BoundingBox, roi: &Roi) -> bool {
    if roi.vertices().iter().any(|v| bbox.contains(*v)) {
        return true;
    }
    if bbox.corners().iter().any(|c| roi.contains(*c)) {
        return true;
    }
    bbox.edges()
        .iter()
        .any(|(p1, p2)| roi.edges().any(|(q1, q2)| segments_intersect(*p1, *p2, q1, q2)))
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn orientation(o: Point, a: Point, b: Point) -> i8 {
    let v = cross(o, a, b);
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn within_extent(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    orientation(a, b, p) == 0 && within_extent(a, b, p)
}

fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }
    (d1 == 0 && within_extent(q1, q2, p1))
        || (d2 == 0 && within_extent(q1, q2, p2))
        || (d3 == 0 && within_extent(p1, p2, q1))
        || (d4 == 0 && within_extent(p1, p2, q2))
}
