use tracing::debug;

use super::energy::{Energy, Smoothness, UnaryCosts};
use super::expansion::Refinement;
use super::{GraphCutParams, pair_terms};
use crate::error::{LayoutError, Result};
use crate::graph::PixelGraph;
use crate::pixel::PixelArena;

/// Smooths the pixels' text orientation over `graph`.
///
/// Each pixel's orientation cost vector is its unary term; neighbouring
/// orientations are compared with the circular distance. Pixels without
/// costs take part with zero unary cost. The chosen orientation index is
/// written back into every pixel's statistics.
pub fn refine_orientations(
    arena: &mut PixelArena,
    graph: &PixelGraph,
    params: &GraphCutParams,
) -> Result<Refinement> {
    let set = graph.set();
    arena.check_set(set)?;
    let num_orientations = set
        .iter()
        .filter_map(|id| arena[id].stats().map(|s| s.num_orientations()))
        .max()
        .unwrap_or(0);

    let mut unary = UnaryCosts::new(num_orientations);
    let mut initial = Vec::with_capacity(set.len());
    let zeros = vec![0.0; num_orientations];
    for id in set.iter() {
        match arena[id].stats().filter(|s| s.num_orientations() > 0) {
            Some(stats) => {
                if stats.num_orientations() != num_orientations {
                    return Err(LayoutError::LabelCountMismatch {
                        expected: num_orientations,
                        got: stats.num_orientations(),
                    });
                }
                unary.push(&stats.orientation_costs)?;
                initial.push(stats.orientation_index().unwrap_or(0));
            }
            None => {
                unary.push(&zeros)?;
                initial.push(0);
            }
        }
    }

    let pairs = pair_terms(graph, arena, params)?;
    let energy = Energy::new(unary, pairs, Smoothness::Circular);
    let result = params.expansion().minimize(&energy, initial)?;

    if num_orientations > 0 {
        for (id, &label) in set.iter().zip(&result.labels) {
            if let Some(stats) = arena.stats_mut(id) {
                stats.set_orientation_index(label);
            }
        }
    }
    debug!(
        pixels = set.len(),
        orientations = num_orientations,
        energy = result.energy,
        "orientation refinement"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelEdge, PixelId, PixelStats};
    use crate::utils::Ellipse;

    #[test]
    fn test_outlier_orientation_is_smoothed() {
        let mut arena = PixelArena::new();
        let costs = [
            vec![0.0, 3.0, 3.0, 3.0],
            vec![0.6, 0.0, 3.0, 3.0],
            vec![0.0, 3.0, 3.0, 3.0],
        ];
        for (i, c) in costs.iter().enumerate() {
            let x = i as f64 * 5.0;
            let bbox = (x - 2.0, -1.0, x + 2.0, 1.0);
            let id = arena.push(Ellipse::new((x, 0.0), (2.0, 1.0), 0.0), bbox);
            arena.set_stats(id, PixelStats::new(0.0, 10.0).with_orientation_costs(c.clone()));
        }
        let edges = vec![
            PixelEdge::with_weight(PixelId(0), PixelId(1), 0.0),
            PixelEdge::with_weight(PixelId(1), PixelId(2), 0.0),
        ];
        let graph = PixelGraph::from_edges(arena.all(), edges).unwrap();

        let result = refine_orientations(&mut arena, &graph, &GraphCutParams::default()).unwrap();
        assert_eq!(result.labels, vec![0, 0, 0]);
        assert_eq!(arena[PixelId(1)].stats().and_then(|s| s.orientation_index()), Some(0));
    }
}
