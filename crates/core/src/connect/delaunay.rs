use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::PixelConnector;
use crate::error::Result;
use crate::pixel::{PixelArena, PixelEdge, PixelSet};
use crate::utils::{EPSILON, Point, cross, dist_sq, dot, get_bound, sub};

/// Connects pixel centers along the edges of their Delaunay triangulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelaunayConnector;

impl DelaunayConnector {
    pub fn new() -> Self {
        Self
    }
}

impl PixelConnector for DelaunayConnector {
    fn name(&self) -> &'static str {
        "delaunay"
    }

    fn connect(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<PixelEdge>> {
        arena.check_set(set)?;
        let ids = set.to_vec();
        let centers: Vec<Point> = ids.iter().map(|&id| arena[id].center()).collect();
        let edges = triangulate(&centers)
            .into_iter()
            .map(|(i, j)| PixelEdge::new(arena, ids[i], ids[j]))
            .collect::<Vec<_>>();
        debug!(pixels = ids.len(), edges = edges.len(), "delaunay connector");
        Ok(edges)
    }
}

#[derive(Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    center: Point,
    radius_sq: f64,
}

impl Triangle {
    fn new(pts: &[Point], v: [usize; 3]) -> Self {
        let (a, b, c) = (pts[v[0]], pts[v[1]], pts[v[2]]);
        let d = 2.0 * cross(sub(b, a), sub(c, a));
        if d.abs() <= EPSILON {
            return Self {
                v,
                center: a,
                radius_sq: f64::INFINITY,
            };
        }
        let (ab, ac) = (sub(b, a), sub(c, a));
        let (lb, lc) = (dot(ab, ab), dot(ac, ac));
        let ux = (ac.1 * lb - ab.1 * lc) / d;
        let uy = (ab.0 * lc - ac.0 * lb) / d;
        Self {
            v,
            center: (a.0 + ux, a.1 + uy),
            radius_sq: ux * ux + uy * uy,
        }
    }

    fn in_circumcircle(&self, p: Point) -> bool {
        dist_sq(p, self.center) < self.radius_sq
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [ordered(a, b), ordered(b, c), ordered(a, c)]
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Index pairs `(i, j)`, `i < j`, of the Delaunay edges over `points`,
/// sorted.
///
/// Duplicate points are linked to their first occurrence. With fewer than
/// three distinct points, or when all points are collinear, consecutive
/// points along the principal direction are connected instead.
pub fn triangulate(points: &[Point]) -> Vec<(usize, usize)> {
    let mut edges: Vec<(usize, usize)> = Vec::new();

    // collapse exact duplicates
    let mut first_of: FxHashMap<(OrderedFloat<f64>, OrderedFloat<f64>), usize> =
        FxHashMap::default();
    let mut unique: Vec<usize> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let key = (OrderedFloat(p.0), OrderedFloat(p.1));
        match first_of.get(&key) {
            Some(&rep) => edges.push((rep, i)),
            None => {
                first_of.insert(key, i);
                unique.push(i);
            }
        }
    }

    let pts: Vec<Point> = unique.iter().map(|&i| points[i]).collect();
    let local = if pts.len() < 3 || is_collinear(&pts) {
        debug!(points = pts.len(), "triangulation undefined, chaining points");
        chain(&pts)
    } else {
        let mut local = bowyer_watson(&pts);
        if !spans_all(pts.len(), &local) {
            // near-degenerate input; keep whatever was found, add the chain
            debug!(points = pts.len(), "triangulation disconnected, adding chain");
            local.extend(chain(&pts));
        }
        local
    };
    edges.extend(local.into_iter().map(|(a, b)| ordered(unique[a], unique[b])));

    edges.sort_unstable();
    edges.dedup();
    edges
}

/// Largest deviation from the principal line, relative to the point spread,
/// below which points count as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-7;

fn is_collinear(pts: &[Point]) -> bool {
    let bound = get_bound(pts.iter().copied());
    let span = (bound.2 - bound.0).max(bound.3 - bound.1);
    if span <= EPSILON {
        return true;
    }
    let p0 = pts[0];
    // farthest point from p0 fixes the direction
    let far = pts
        .iter()
        .copied()
        .max_by_key(|&p| OrderedFloat(dist_sq(p, p0)))
        .unwrap_or(p0);
    let dir = sub(far, p0);
    let len = dot(dir, dir).sqrt();
    pts.iter()
        .all(|&p| (cross(dir, sub(p, p0)) / len).abs() <= COLLINEAR_TOLERANCE * span)
}

/// True if `edges` link all `n` points into one component.
fn spans_all(n: usize, edges: &[(usize, usize)]) -> bool {
    let mut parent: Vec<usize> = (0..n).collect();
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    let mut components = n;
    for &(a, b) in edges {
        let (ra, rb) = (root(&mut parent, a), root(&mut parent, b));
        if ra != rb {
            parent[ra.max(rb)] = ra.min(rb);
            components -= 1;
        }
    }
    components <= 1
}

/// Connects points in order along their dominant axis.
fn chain(pts: &[Point]) -> Vec<(usize, usize)> {
    if pts.len() < 2 {
        return Vec::new();
    }
    let bound = get_bound(pts.iter().copied());
    let horizontal = bound.2 - bound.0 >= bound.3 - bound.1;
    let mut order: Vec<usize> = (0..pts.len()).collect();
    order.sort_by_key(|&i| {
        let p = pts[i];
        if horizontal {
            (OrderedFloat(p.0), OrderedFloat(p.1), i)
        } else {
            (OrderedFloat(p.1), OrderedFloat(p.0), i)
        }
    });
    order.windows(2).map(|w| ordered(w[0], w[1])).collect()
}

fn bowyer_watson(input: &[Point]) -> Vec<(usize, usize)> {
    let n = input.len();
    let bound = get_bound(input.iter().copied());
    let span = (bound.2 - bound.0).max(bound.3 - bound.1).max(1.0);
    let mid = ((bound.0 + bound.2) * 0.5, (bound.1 + bound.3) * 0.5);

    let mut pts = input.to_vec();
    pts.push((mid.0 - 100.0 * span, mid.1 - 100.0 * span));
    pts.push((mid.0 + 100.0 * span, mid.1 - 100.0 * span));
    pts.push((mid.0, mid.1 + 100.0 * span));

    let mut triangles = vec![Triangle::new(&pts, [n, n + 1, n + 2])];
    let mut boundary: FxHashMap<(usize, usize), u32> = FxHashMap::default();

    for i in 0..n {
        let p = pts[i];
        boundary.clear();
        let mut kept = Vec::with_capacity(triangles.len() + 2);
        for tri in triangles.drain(..) {
            if tri.in_circumcircle(p) {
                for e in tri.edges() {
                    *boundary.entry(e).or_insert(0) += 1;
                }
            } else {
                kept.push(tri);
            }
        }
        triangles = kept;

        let mut cavity: Vec<(usize, usize)> = boundary
            .iter()
            .filter(|(_, count)| **count == 1)
            .map(|(e, _)| *e)
            .collect();
        cavity.sort_unstable();
        for (a, b) in cavity {
            triangles.push(Triangle::new(&pts, [a, b, i]));
        }
    }

    // hull triangles touch the super triangle; their inner edges stay
    let mut edges: Vec<(usize, usize)> = triangles
        .iter()
        .flat_map(|t| t.edges())
        .filter(|&(a, b)| a < n && b < n)
        .collect();
    edges.sort_unstable();
    edges.dedup();
    edges
}
