use std::f64::consts::PI;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use super::{DelaunayConnector, PixelConnector};
use crate::error::Result;
use crate::pixel::{PixelArena, PixelEdge, PixelSet, PixelTabStop, TabStopKind};
use crate::utils::{Plane, Point, Rect, dot, orientation_dist, sub, unit};

/// Maximum orientation difference between two aligned tab stops.
const MAX_ORIENTATION_DIFF: f64 = 0.2;

/// Connects left (or right) tab stops that share a vertical alignment.
///
/// Tab stops are read from the arena; if no member of the set carries one,
/// they are derived from the set's Delaunay edges first.
#[derive(Debug, Clone, Copy)]
pub struct TabStopConnector {
    multiplier: f64,
    tolerance: f64,
}

impl Default for TabStopConnector {
    fn default() -> Self {
        Self::new(1.0, 0.1)
    }
}

struct Candidate {
    pos: usize,
    offset: f64,
    horizontal: f64,
    vertical: f64,
}

impl TabStopConnector {
    /// `multiplier` scales the search radius (three line spacings), and
    /// `tolerance` the allowed anchor offset (in line spacings).
    pub fn new(multiplier: f64, tolerance: f64) -> Self {
        Self {
            multiplier,
            tolerance,
        }
    }

    fn tab_stops(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<TabStopKind>> {
        let assigned: Vec<TabStopKind> = set.iter().map(|id| arena[id].tab_stop().kind()).collect();
        if assigned.iter().any(|k| *k != TabStopKind::None) {
            return Ok(assigned);
        }

        let edges = DelaunayConnector::new().connect(arena, set)?;
        let mut incident: FxHashMap<usize, SmallVec<[usize; 8]>> = FxHashMap::default();
        for (idx, e) in edges.iter().enumerate() {
            for id in [e.first(), e.second()] {
                if let Some(pos) = set.position(id) {
                    incident.entry(pos).or_default().push(idx);
                }
            }
        }
        Ok(set
            .iter()
            .enumerate()
            .map(|(pos, id)| {
                let own = incident.get(&pos).map(|v| v.as_slice()).unwrap_or(&[]);
                PixelTabStop::create(arena, id, own.iter().map(|&i| &edges[i])).kind()
            })
            .collect())
    }
}

fn anchor(arena: &PixelArena, set: &PixelSet, pos: usize, kind: TabStopKind) -> Point {
    let Some(id) = set.get(pos) else {
        return (0.0, 0.0);
    };
    let px = &arena[id];
    match kind {
        TabStopKind::Left => px.ellipse().point_at(px.orientation() + PI),
        TabStopKind::Right => px.ellipse().point_at(px.orientation()),
        _ => px.center(),
    }
}

impl PixelConnector for TabStopConnector {
    fn name(&self) -> &'static str {
        "tabstop"
    }

    fn connect(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<PixelEdge>> {
        arena.check_set(set)?;
        let ids = set.to_vec();
        let kinds = self.tab_stops(arena, set)?;
        let anchors: Vec<Point> = (0..ids.len())
            .map(|pos| anchor(arena, set, pos, kinds[pos]))
            .collect();
        let centers: Vec<Rect> = ids
            .iter()
            .map(|&id| {
                let (x, y) = arena[id].center();
                (x, y, x, y)
            })
            .collect();
        let plane = Plane::from_items(centers);

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for (i, &id) in ids.iter().enumerate() {
            if !matches!(kinds[i], TabStopKind::Left | TabStopKind::Right) {
                continue;
            }
            let px = &arena[id];
            let spacing = px.line_spacing();
            let radius = spacing * self.multiplier * 3.0;
            let tolerance = spacing * self.tolerance;
            let u = unit(px.orientation());
            let v = (-u.1, u.0);

            let mut candidates: Vec<Candidate> = plane
                .within_radius(px.center(), radius)
                .into_iter()
                .filter(|&j| j != i && kinds[j] == kinds[i])
                .filter(|&j| {
                    orientation_dist(px.orientation(), arena[ids[j]].orientation())
                        <= MAX_ORIENTATION_DIFF
                })
                .filter_map(|j| {
                    let offset = dot(sub(anchors[j], anchors[i]), u).abs();
                    if offset > tolerance {
                        return None;
                    }
                    let d = sub(arena[ids[j]].center(), px.center());
                    Some(Candidate {
                        pos: j,
                        offset,
                        horizontal: dot(d, u).abs(),
                        vertical: dot(d, v).abs(),
                    })
                })
                .collect();

            candidates.sort_by_key(|c| {
                (
                    OrderedFloat(c.offset),
                    OrderedFloat(c.horizontal),
                    OrderedFloat(c.vertical),
                    c.pos,
                )
            });
            // keep the better half when there is a choice
            if candidates.len() > 2 {
                candidates.truncate(candidates.len().div_ceil(2));
            }
            pairs.extend(
                candidates
                    .iter()
                    .map(|c| if i < c.pos { (i, c.pos) } else { (c.pos, i) }),
            );
        }
        pairs.sort_unstable();
        pairs.dedup();

        let edges: Vec<PixelEdge> = pairs
            .into_iter()
            .map(|(i, j)| PixelEdge::new(arena, ids[i], ids[j]))
            .collect();
        debug!(pixels = ids.len(), edges = edges.len(), "tab stop connector");
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelId, PixelStats};
    use crate::utils::Ellipse;

    #[test]
    fn test_left_aligned_line_starts_connect() {
        let mut arena = PixelArena::new();
        // three lines, left aligned at x = 0, each with two words
        for line in 0..3 {
            let y = line as f64 * 10.0;
            for (x, half) in [(4.0, 4.0), (20.0, 6.0)] {
                let bbox = (x - half, y - 2.0, x + half, y + 2.0);
                let id = arena.push(Ellipse::new((x, y), (half, 2.0), 0.0), bbox);
                arena.set_stats(id, PixelStats::new(0.0, 10.0));
            }
        }
        let set = arena.all();
        arena.set_tab_stop(PixelId(0), PixelTabStop::new(TabStopKind::Left));
        arena.set_tab_stop(PixelId(2), PixelTabStop::new(TabStopKind::Left));
        arena.set_tab_stop(PixelId(4), PixelTabStop::new(TabStopKind::Left));
        for id in [1, 3, 5] {
            arena.set_tab_stop(PixelId(id), PixelTabStop::new(TabStopKind::Right));
        }

        let edges = TabStopConnector::default().connect(&arena, &set).unwrap();
        let pairs: Vec<(usize, usize)> =
            edges.iter().map(|e| (e.first().0, e.second().0)).collect();
        assert!(pairs.contains(&(0, 2)));
        assert!(pairs.contains(&(2, 4)));
        assert!(pairs.contains(&(1, 3)));
        assert!(pairs.iter().all(|&(a, b)| a % 2 == b % 2));
    }
}
