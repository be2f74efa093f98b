//! Geometry helpers and the `Plane` spatial index.
//!
//! Provides:
//! - Geometric types (Point, Rect, Ellipse, Line)
//! - Angle and quantile helpers shared by connectors and statistics
//! - Plane, an R-tree backed index for box and radius queries

use std::f64::consts::PI;

use geo_index::rtree::sort::HilbertSort;
use geo_index::rtree::{RTree as GeoRTree, RTreeBuilder, RTreeIndex};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Floating-point infinity for bounding box calculations.
pub const INF_F64: f64 = f64::MAX;

/// Small epsilon for floating-point comparisons.
pub const EPSILON: f64 = 1e-9;

/// A 2D point (x, y) in image coordinates (y grows downwards).
pub type Point = (f64, f64);

/// A rectangle defined by (x0, y0, x1, y1) where (x0, y0) is the top-left corner.
pub type Rect = (f64, f64, f64, f64);

/// Compares two floats for approximate equality.
#[inline]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Trait for objects that have a bounding box.
pub trait HasBBox {
    fn x0(&self) -> f64;
    fn y0(&self) -> f64;
    fn x1(&self) -> f64;
    fn y1(&self) -> f64;

    fn bbox(&self) -> Rect {
        (self.x0(), self.y0(), self.x1(), self.y1())
    }

    fn width(&self) -> f64 {
        self.x1() - self.x0()
    }

    fn height(&self) -> f64 {
        self.y1() - self.y0()
    }

    fn center(&self) -> Point {
        ((self.x0() + self.x1()) * 0.5, (self.y0() + self.y1()) * 0.5)
    }
}

impl HasBBox for Rect {
    fn x0(&self) -> f64 {
        self.0
    }
    fn y0(&self) -> f64 {
        self.1
    }
    fn x1(&self) -> f64 {
        self.2
    }
    fn y1(&self) -> f64 {
        self.3
    }
}

/// Computes a minimal rectangle that covers all the points.
pub fn get_bound<I: IntoIterator<Item = Point>>(pts: I) -> Rect {
    let mut x0 = INF_F64;
    let mut y0 = INF_F64;
    let mut x1 = -INF_F64;
    let mut y1 = -INF_F64;

    for (x, y) in pts {
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }

    (x0, y0, x1, y1)
}

/// Union of two rectangles.
pub fn bbox_union(a: Rect, b: Rect) -> Rect {
    (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3))
}

/// Euclidean gap between two rectangles; 0 when they touch or overlap.
pub fn bbox_gap(a: Rect, b: Rect) -> f64 {
    let dx = (a.0.max(b.0) - a.2.min(b.2)).max(0.0);
    let dy = (a.1.max(b.1) - a.3.min(b.3)).max(0.0);
    dx.hypot(dy)
}

/// Grows a rectangle by `margin` on every side.
pub fn bbox_expand(r: Rect, margin: f64) -> Rect {
    (r.0 - margin, r.1 - margin, r.2 + margin, r.3 + margin)
}

#[inline]
pub fn sub(a: Point, b: Point) -> Point {
    (a.0 - b.0, a.1 - b.1)
}

#[inline]
pub fn dot(a: Point, b: Point) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

#[inline]
pub fn cross(a: Point, b: Point) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

#[inline]
pub fn norm(a: Point) -> f64 {
    a.0.hypot(a.1)
}

#[inline]
pub fn dist(a: Point, b: Point) -> f64 {
    norm(sub(a, b))
}

#[inline]
pub fn dist_sq(a: Point, b: Point) -> f64 {
    let d = sub(a, b);
    dot(d, d)
}

/// Unit vector pointing in direction `angle`.
#[inline]
pub fn unit(angle: f64) -> Point {
    let (s, c) = angle.sin_cos();
    (c, s)
}

/// Normalizes an angle into `[0, max)`.
pub fn norm_angle(angle: f64, max: f64) -> f64 {
    let a = angle.rem_euclid(max);
    if a >= max { 0.0 } else { a }
}

/// Distance between two angles modulo `max` (π for undirected orientations).
pub fn angle_dist(a: f64, b: f64, max: f64) -> f64 {
    let d = norm_angle(a - b, max);
    d.min(max - d)
}

/// Undirected orientation distance, modulo π.
pub fn orientation_dist(a: f64, b: f64) -> f64 {
    angle_dist(a, b, PI)
}

/// Returns the `moment` quantile of `values` (0.5 is the median).
///
/// An empty input yields 0.
pub fn stat_moment(values: &[f64], moment: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by_key(|v| OrderedFloat(*v));
    let moment = moment.clamp(0.0, 1.0);
    let idx = ((sorted.len() - 1) as f64 * moment).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// An ellipse given by its center, semi-axis lengths and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point,
    /// Semi-axis lengths, major first.
    pub axes: (f64, f64),
    /// Orientation of the major axis in radians.
    pub angle: f64,
}

impl Ellipse {
    /// Creates an ellipse; axes are swapped so that the major axis comes first.
    pub fn new(center: Point, axes: (f64, f64), angle: f64) -> Self {
        let (a, b) = (axes.0.abs(), axes.1.abs());
        if b > a {
            Self {
                center,
                axes: (b, a),
                angle: norm_angle(angle + PI * 0.5, PI),
            }
        } else {
            Self {
                center,
                axes: (a, b),
                angle: norm_angle(angle, PI),
            }
        }
    }

    pub fn major_axis(&self) -> f64 {
        self.axes.0
    }

    pub fn minor_axis(&self) -> f64 {
        self.axes.1
    }

    /// minor / major, in `[0, 1]`; degenerate ellipses yield 0.
    pub fn axis_ratio(&self) -> f64 {
        if self.axes.0 <= EPSILON {
            0.0
        } else {
            self.axes.1 / self.axes.0
        }
    }

    pub fn area(&self) -> f64 {
        PI * self.axes.0 * self.axes.1
    }

    /// Point on the ellipse boundary in (absolute) direction `angle`.
    pub fn point_at(&self, angle: f64) -> Point {
        let (a, b) = self.axes;
        let t = angle - self.angle;
        let denom = ((b * t.cos()).powi(2) + (a * t.sin()).powi(2)).sqrt();
        let r = if denom <= EPSILON { 0.0 } else { a * b / denom };
        let (dx, dy) = unit(angle);
        (self.center.0 + r * dx, self.center.1 + r * dy)
    }
}

/// A line segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
}

impl Line {
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn vector(&self) -> Point {
        sub(self.p2, self.p1)
    }

    pub fn length(&self) -> f64 {
        norm(self.vector())
    }

    pub fn squared_length(&self) -> f64 {
        let v = self.vector();
        dot(v, v)
    }

    pub fn angle(&self) -> f64 {
        let (x, y) = self.vector();
        y.atan2(x)
    }

    pub fn is_empty(&self) -> bool {
        self.squared_length() <= EPSILON
    }

    pub fn center(&self) -> Point {
        ((self.p1.0 + self.p2.0) * 0.5, (self.p1.1 + self.p2.1) * 0.5)
    }
}

/// Least-squares (total) line fit through `pts`.
///
/// The returned segment passes through the centroid along the principal
/// direction and spans the projections of all points.
pub fn fit_line(pts: &[Point]) -> Option<Line> {
    if pts.is_empty() {
        return None;
    }
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in pts {
        let dx = p.0 - cx;
        let dy = p.1 - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let dir = unit(angle);

    let mut t_min = f64::INFINITY;
    let mut t_max = f64::NEG_INFINITY;
    for p in pts {
        let t = dot(sub(*p, (cx, cy)), dir);
        t_min = t_min.min(t);
        t_max = t_max.max(t);
    }

    Some(Line::new(
        (cx + dir.0 * t_min, cy + dir.1 * t_min),
        (cx + dir.0 * t_max, cy + dir.1 * t_max),
    ))
}

/// A spatial index over objects placed on a plane.
///
/// Items are bulk-loaded into a static geo-index R-tree. Ids are stable
/// (id == position in the input).
pub struct Plane<T> {
    seq: Vec<T>,
    bboxes: Vec<Rect>,
    /// None when the plane is empty
    tree: Option<GeoRTree<f64>>,
}

impl<T: HasBBox> Plane<T> {
    /// Builds a plane from `objs` with a bulk-loaded index.
    pub fn from_items(objs: impl IntoIterator<Item = T>) -> Self {
        let seq: Vec<T> = objs.into_iter().collect();
        let bboxes: Vec<Rect> = seq.iter().map(HasBBox::bbox).collect();
        let tree = (!bboxes.is_empty()).then(|| {
            let mut builder: RTreeBuilder<f64> = RTreeBuilder::new(bboxes.len() as u32);
            for bbox in &bboxes {
                builder.add(bbox.0, bbox.1, bbox.2, bbox.3);
            }
            builder.finish::<HilbertSort>()
        });
        Self { seq, bboxes, tree }
    }

    /// Finds objects whose bbox intersects or touches `bbox`.
    ///
    /// Results are sorted by id so callers see a deterministic order.
    pub fn find_with_indices(&self, bbox: Rect) -> Vec<(usize, &T)> {
        let (x0, y0, x1, y1) = bbox;
        let mut ids = Vec::with_capacity(16);

        let touches = |b: Rect| !(b.2 < x0 || x1 < b.0 || b.3 < y0 || y1 < b.1);

        if let Some(tree) = &self.tree {
            for id in tree.search(x0, y0, x1, y1) {
                let id = id as usize;
                if id < self.bboxes.len() && touches(self.bboxes[id]) {
                    ids.push(id);
                }
            }
        }

        ids.sort_unstable();
        ids.into_iter().map(|id| (id, &self.seq[id])).collect()
    }

    /// Ids of all objects whose bbox center lies within `radius` of `point`.
    ///
    /// Sorted by id.
    pub fn within_radius(&self, point: Point, radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        let query = (point.0 - radius, point.1 - radius, point.0 + radius, point.1 + radius);
        let mut ids: Vec<usize> = self
            .find_with_indices(query)
            .into_iter()
            .map(|(id, _)| id)
            .filter(|&id| dist_sq(self.bboxes[id].center(), point) <= r2)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_dist_wraps_modulo_pi() {
        assert!(approx_eq(orientation_dist(0.1, PI - 0.1), 0.2, 1e-12));
        assert!(approx_eq(orientation_dist(0.0, PI), 0.0, 1e-12));
        assert!(approx_eq(angle_dist(0.0, 1.5 * PI, 2.0 * PI), 0.5 * PI, 1e-12));
    }

    #[test]
    fn test_stat_moment_median() {
        assert_eq!(stat_moment(&[5.0, 1.0, 3.0], 0.5), 3.0);
        assert_eq!(stat_moment(&[], 0.5), 0.0);
        assert_eq!(stat_moment(&[2.0, 8.0], 1.0), 8.0);
    }

    #[test]
    fn test_bbox_gap() {
        assert_eq!(bbox_gap((0.0, 0.0, 1.0, 1.0), (0.5, 0.5, 2.0, 2.0)), 0.0);
        assert_eq!(bbox_gap((0.0, 0.0, 1.0, 1.0), (4.0, 0.0, 5.0, 1.0)), 3.0);
        assert!(approx_eq(
            bbox_gap((0.0, 0.0, 1.0, 1.0), (4.0, 5.0, 5.0, 6.0)),
            5.0,
            1e-12
        ));
    }

    #[test]
    fn test_ellipse_normalizes_axes() {
        let e = Ellipse::new((0.0, 0.0), (1.0, 3.0), 0.0);
        assert_eq!(e.major_axis(), 3.0);
        assert!(approx_eq(e.angle, PI * 0.5, 1e-12));
        let p = e.point_at(PI * 0.5);
        assert!(approx_eq(p.1, 3.0, 1e-9));
    }

    #[test]
    fn test_fit_line_horizontal() {
        let line = fit_line(&[(0.0, 1.0), (5.0, 1.0), (10.0, 1.0)]).unwrap();
        assert!(approx_eq(line.length(), 10.0, 1e-9));
        assert!(approx_eq(line.p1.1, 1.0, 1e-9));
    }

    #[test]
    fn test_plane_radius_and_box_queries() {
        let rects: Vec<Rect> = vec![
            (0.0, 0.0, 2.0, 2.0),
            (3.0, 0.0, 5.0, 2.0),
            (50.0, 50.0, 52.0, 52.0),
            (2.0, 2.0, 3.0, 3.0),
        ];
        let plane = Plane::from_items(rects);

        assert_eq!(plane.within_radius((1.0, 1.0), 3.0), vec![0, 1, 3]);
        let hits: Vec<usize> = plane
            .find_with_indices((2.0, 0.0, 3.0, 1.0))
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(hits, vec![0, 1]);

        assert!(plane.within_radius((10.0, 10.0), 5.0).is_empty());
        assert_eq!(plane.len(), 4);
        let empty = Plane::<Rect>::from_items(Vec::new());
        assert!(empty.find_with_indices((0.0, 0.0, 1.0, 1.0)).is_empty());
    }
}
