use std::f64::consts::FRAC_PI_2;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{PixelArena, PixelEdge, PixelId, PixelSet};
use crate::utils::{dot, norm, sub, unit};

/// Minimum |cos| between an edge and the text direction for the edge to
/// count as a same-line neighbour.
const PARALLEL_COS: f64 = 0.75;
/// A neighbour this many times closer on one side marks a gap on the other.
const NEIGHBOR_RATIO: f64 = 0.3;
const MIN_EDGE_LENGTH: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStopKind {
    #[default]
    None,
    /// No same-line neighbour on the left: the pixel starts a line.
    Left,
    /// No same-line neighbour on the right: the pixel ends a line.
    Right,
    /// No same-line neighbour at all.
    Isolated,
}

/// Tab-stop classification of a single pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelTabStop {
    kind: TabStopKind,
}

impl PixelTabStop {
    pub fn new(kind: TabStopKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> TabStopKind {
        self.kind
    }

    /// Offset of the tab's normal from the text direction: `+π/2` for left
    /// tabs, `-π/2` for right tabs, 0 otherwise.
    pub fn orientation(&self) -> f64 {
        match self.kind {
            TabStopKind::Left => FRAC_PI_2,
            TabStopKind::Right => -FRAC_PI_2,
            _ => 0.0,
        }
    }

    pub fn is_tab_stop(&self) -> bool {
        matches!(self.kind, TabStopKind::Left | TabStopKind::Right)
    }

    /// Classifies `id` from its incident `edges`.
    ///
    /// Only edges roughly parallel to the pixel's text direction are looked
    /// at; a missing (or much farther) neighbour on one side makes the pixel
    /// a tab stop on that side.
    pub fn create<'a>(
        arena: &PixelArena,
        id: PixelId,
        edges: impl IntoIterator<Item = &'a PixelEdge>,
    ) -> Self {
        let px = &arena[id];
        let dir = unit(px.orientation());
        let mut left = f64::INFINITY;
        let mut right = f64::INFINITY;
        let mut seen = false;

        for edge in edges {
            let Some(other) = edge.other(id) else {
                continue;
            };
            let v = sub(arena[other].center(), px.center());
            let len = norm(v);
            if len < MIN_EDGE_LENGTH {
                continue;
            }
            let cos = dot(v, dir) / len;
            if cos.abs() < PARALLEL_COS {
                continue;
            }
            seen = true;
            if cos > 0.0 {
                right = right.min(len);
            } else {
                left = left.min(len);
            }
        }

        let kind = match (left.is_finite(), right.is_finite()) {
            _ if !seen => TabStopKind::Isolated,
            (false, _) => TabStopKind::Left,
            (_, false) => TabStopKind::Right,
            _ if left / right < NEIGHBOR_RATIO => TabStopKind::Right,
            _ if right / left < NEIGHBOR_RATIO => TabStopKind::Left,
            _ => TabStopKind::None,
        };
        Self { kind }
    }

    /// Computes and stores the tab stop of every member of `set`.
    pub fn assign(arena: &mut PixelArena, set: &PixelSet, edges: &[PixelEdge]) {
        let mut incident: FxHashMap<PixelId, SmallVec<[usize; 8]>> = FxHashMap::default();
        for (idx, edge) in edges.iter().enumerate() {
            incident.entry(edge.first()).or_default().push(idx);
            if !edge.is_loop() {
                incident.entry(edge.second()).or_default().push(idx);
            }
        }

        let tabs: Vec<(PixelId, PixelTabStop)> = set
            .iter()
            .map(|id| {
                let own = incident.get(&id).map(|v| v.as_slice()).unwrap_or(&[]);
                (id, Self::create(arena, id, own.iter().map(|&i| &edges[i])))
            })
            .collect();
        for (id, tab) in tabs {
            arena.set_tab_stop(id, tab);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelStats;
    use crate::utils::Ellipse;

    #[test]
    fn test_line_ends_become_tab_stops() {
        let mut arena = PixelArena::new();
        let set: PixelSet = (0..3)
            .map(|i| {
                let x = i as f64 * 10.0;
                let bbox = (x - 3.0, -2.0, x + 3.0, 2.0);
                let id = arena.push(Ellipse::new((x, 0.0), (3.0, 2.0), 0.0), bbox);
                arena.set_stats(id, PixelStats::new(0.0, 20.0));
                id
            })
            .collect();
        let edges = vec![
            PixelEdge::new(&arena, PixelId(0), PixelId(1)),
            PixelEdge::new(&arena, PixelId(1), PixelId(2)),
        ];
        PixelTabStop::assign(&mut arena, &set, &edges);

        assert_eq!(arena[PixelId(0)].tab_stop().kind(), TabStopKind::Left);
        assert_eq!(arena[PixelId(1)].tab_stop().kind(), TabStopKind::None);
        assert_eq!(arena[PixelId(2)].tab_stop().kind(), TabStopKind::Right);
    }

    #[test]
    fn test_vertical_neighbours_only_is_isolated() {
        let mut arena = PixelArena::new();
        arena.push(Ellipse::new((0.0, 0.0), (3.0, 2.0), 0.0), (-3.0, -2.0, 3.0, 2.0));
        arena.push(Ellipse::new((0.0, 30.0), (3.0, 2.0), 0.0), (-3.0, 28.0, 3.0, 32.0));
        let edge = PixelEdge::new(&arena, PixelId(0), PixelId(1));
        let tab = PixelTabStop::create(&arena, PixelId(0), [&edge]);
        assert_eq!(tab.kind(), TabStopKind::Isolated);
    }
}
