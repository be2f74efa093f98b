use serde::{Deserialize, Serialize};

use super::{PixelArena, PixelId};
use crate::utils::{EPSILON, Line, orientation_dist};

/// How an edge's weight was derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeKind {
    /// Plain pixel edge weighted by line spacing.
    Pixel,
    /// Edge along a text line; `stats_weight` in `[0, 1]` is the agreement of
    /// the edge direction with both endpoints' text orientation.
    Line { stats_weight: f64 },
    /// Weight supplied by the caller.
    Explicit,
}

/// Weighted undirected connection between two pixels.
///
/// Weights live in `[0, 1]`; small weights mean strongly connected pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelEdge {
    first: PixelId,
    second: PixelId,
    weight: f64,
    kind: EdgeKind,
}

impl PixelEdge {
    /// Pixel edge weighted by the endpoints' line spacing:
    /// `1 - exp(-|e|² / (sp² + sq²))`.
    pub fn new(arena: &PixelArena, first: PixelId, second: PixelId) -> Self {
        Self {
            first,
            second,
            weight: spacing_weight(arena, first, second),
            kind: EdgeKind::Pixel,
        }
    }

    /// Line edge: edges parallel to both endpoints' text direction keep the
    /// spacing weight, perpendicular ones approach 1.
    pub fn line(arena: &PixelArena, first: PixelId, second: PixelId) -> Self {
        let base = spacing_weight(arena, first, second);
        let stats_weight = stats_weight(arena, first, second);
        Self {
            first,
            second,
            weight: 1.0 - (1.0 - base) * stats_weight,
            kind: EdgeKind::Line { stats_weight },
        }
    }

    pub fn with_weight(first: PixelId, second: PixelId, weight: f64) -> Self {
        Self {
            first,
            second,
            weight: weight.clamp(0.0, 1.0),
            kind: EdgeKind::Explicit,
        }
    }

    pub fn first(&self) -> PixelId {
        self.first
    }

    pub fn second(&self) -> PixelId {
        self.second
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Edge weight as computed by the edge's kind.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn contains(&self, id: PixelId) -> bool {
        self.first == id || self.second == id
    }

    /// The endpoint opposite to `id`.
    pub fn other(&self, id: PixelId) -> Option<PixelId> {
        if self.first == id {
            Some(self.second)
        } else if self.second == id {
            Some(self.first)
        } else {
            None
        }
    }

    pub fn is_loop(&self) -> bool {
        self.first == self.second
    }

    /// Segment between both pixel centers.
    pub fn segment(&self, arena: &PixelArena) -> Line {
        Line::new(arena[self.first].center(), arena[self.second].center())
    }
}

fn spacing_weight(arena: &PixelArena, first: PixelId, second: PixelId) -> f64 {
    let (p, q) = (&arena[first], &arena[second]);
    let len_sq = Line::new(p.center(), q.center()).squared_length();
    let sp = p.line_spacing();
    let sq = q.line_spacing();
    let denom = sp * sp + sq * sq;
    if denom <= EPSILON {
        return if len_sq <= EPSILON { 0.0 } else { 1.0 };
    }
    1.0 - (-len_sq / denom).exp()
}

fn stats_weight(arena: &PixelArena, first: PixelId, second: PixelId) -> f64 {
    let line = Line::new(arena[first].center(), arena[second].center());
    if line.is_empty() {
        return 1.0;
    }
    let angle = line.angle();
    let agreement = |id: PixelId| match arena[id].stats() {
        Some(stats) => orientation_dist(angle, stats.orientation).cos(),
        None => 0.5,
    };
    0.5 * (agreement(first) + agreement(second))
}
