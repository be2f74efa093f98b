use tracing::debug;

use super::PixelConnector;
use crate::error::Result;
use crate::pixel::{PixelArena, PixelEdge, PixelSet};
use crate::utils::{HasBBox, Plane, Rect, bbox_expand, bbox_gap};

/// Connects pixels whose bounding boxes overlap or lie within a gap
/// threshold of each other.
///
/// The threshold is either fixed or each pixel's line spacing times a
/// multiplier; a pair connects if the gap is within either endpoint's
/// threshold.
#[derive(Debug, Clone, Copy)]
pub struct RegionConnector {
    multiplier: f64,
    max_distance: Option<f64>,
}

impl Default for RegionConnector {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl RegionConnector {
    pub fn new(line_spacing_multiplier: f64) -> Self {
        Self {
            multiplier: line_spacing_multiplier,
            max_distance: None,
        }
    }

    pub fn with_max_distance(max_distance: f64) -> Self {
        Self {
            multiplier: 0.0,
            max_distance: Some(max_distance),
        }
    }

    fn radius(&self, arena: &PixelArena, set: &PixelSet, pos: usize) -> f64 {
        let r = match (self.max_distance, set.get(pos)) {
            (Some(d), _) => d,
            (None, Some(id)) => arena[id].line_spacing() * self.multiplier,
            (None, None) => 0.0,
        };
        if r.is_finite() { r.max(0.0) } else { 0.0 }
    }
}

impl PixelConnector for RegionConnector {
    fn name(&self) -> &'static str {
        "region"
    }

    fn connect(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<PixelEdge>> {
        arena.check_set(set)?;
        let ids = set.to_vec();
        let boxes: Vec<Rect> = ids.iter().map(|&id| arena[id].bbox()).collect();
        let plane = Plane::from_items(boxes.iter().copied());

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for (i, bbox) in boxes.iter().enumerate() {
            let r = self.radius(arena, set, i);
            for (j, other) in plane.find_with_indices(bbox_expand(*bbox, r)) {
                if j != i && bbox_gap(*bbox, *other) <= r {
                    pairs.push(if i < j { (i, j) } else { (j, i) });
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();

        let edges: Vec<PixelEdge> = pairs
            .into_iter()
            .map(|(i, j)| PixelEdge::new(arena, ids[i], ids[j]))
            .collect();
        debug!(pixels = ids.len(), edges = edges.len(), "region connector");
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelId;
    use crate::utils::Ellipse;

    #[test]
    fn test_gap_threshold_uses_larger_radius() {
        let mut arena = PixelArena::new();
        arena.push(Ellipse::new((1.0, 1.0), (1.0, 1.0), 0.0), (0.0, 0.0, 2.0, 2.0));
        arena.push(Ellipse::new((5.0, 1.0), (1.0, 1.0), 0.0), (4.0, 0.0, 6.0, 2.0));
        arena.push(Ellipse::new((30.0, 1.0), (1.0, 1.0), 0.0), (29.0, 0.0, 31.0, 2.0));
        let set = arena.all();

        let edges = RegionConnector::with_max_distance(2.0).connect(&arena, &set).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].first(), edges[0].second()), (PixelId(0), PixelId(1)));

        assert!(RegionConnector::with_max_distance(1.9).connect(&arena, &set).unwrap().is_empty());
    }
}
