use tracing::debug;

use super::energy::{Energy, Smoothness, UnaryCosts};
use super::{GraphCutParams, pair_terms};
use crate::connect::DelaunayConnector;
use crate::error::Result;
use crate::graph::PixelGraph;
use crate::pixel::{PixelArena, PixelSet};
use crate::utils::{Point, norm, orientation_dist, sub};

/// Keeps pixels that sit exactly on their line's axis from costing nothing.
const ALIGNMENT_FLOOR: f64 = 0.01;

/// Cost of assigning a pixel at `center` to a line centered at `line_center`.
///
/// The distance to the line center is scaled by how far the direction
/// towards it deviates from the pixel's text orientation, so pixels prefer
/// lines they are aligned with. Pixels without statistics pay the plain
/// distance.
fn line_cost(center: Point, orientation: Option<f64>, line_center: Point) -> f64 {
    let d = sub(line_center, center);
    let deviation = match orientation {
        Some(o) if norm(d) > 0.0 => orientation_dist(d.1.atan2(d.0), o),
        Some(_) => 0.0,
        None => 1.0,
    };
    norm(d) * (deviation + ALIGNMENT_FLOOR)
}

/// Reassigns pixels between text lines.
///
/// Every line is one label; a pixel's unary cost is [`line_cost`] towards
/// each line center and neighbouring pixels (Delaunay edges over all lines)
/// pay the circular label distance for disagreeing. Lines start as given.
/// A pixel listed in several lines starts in the first of them.
///
/// Returns the new lines ordered by their original index; lines that lose
/// all their pixels are dropped.
pub fn refine_text_lines(
    arena: &PixelArena,
    lines: &[PixelSet],
    params: &GraphCutParams,
) -> Result<Vec<PixelSet>> {
    let lines: Vec<&PixelSet> = lines.iter().filter(|l| !l.is_empty()).collect();
    let mut all = PixelSet::new();
    let mut initial = Vec::new();
    for (label, line) in lines.iter().enumerate() {
        arena.check_set(line)?;
        for id in line.iter() {
            if all.add(id) {
                initial.push(label);
            }
        }
    }
    if lines.len() < 2 {
        return Ok(lines.into_iter().cloned().collect());
    }

    let centers: Vec<Point> = lines.iter().filter_map(|l| l.center(arena)).collect();
    let mut unary = UnaryCosts::new(lines.len());
    for id in all.iter() {
        let px = &arena[id];
        let orientation = px.stats().map(|s| s.orientation);
        let costs: Vec<f64> = centers
            .iter()
            .map(|&c| line_cost(px.center(), orientation, c))
            .collect();
        unary.push(&costs)?;
    }

    let graph = PixelGraph::build(arena, all, &DelaunayConnector::new())?;
    let energy = Energy::new(unary, pair_terms(&graph, arena, params)?, Smoothness::Circular);
    let result = params.expansion().minimize(&energy, initial)?;

    let mut refined = vec![PixelSet::new(); lines.len()];
    for (id, &label) in graph.set().iter().zip(&result.labels) {
        refined[label].add(id);
    }
    refined.retain(|l| !l.is_empty());
    debug!(
        pixels = graph.num_pixels(),
        lines = lines.len(),
        refined = refined.len(),
        energy = result.energy,
        initial_energy = result.initial_energy,
        "text line refinement"
    );
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_line_cost_prefers_aligned_lines() {
        let along = line_cost((0.0, 0.0), Some(0.0), (10.0, 0.0));
        let across = line_cost((0.0, 0.0), Some(0.0), (0.0, 10.0));
        assert!((along - 0.1).abs() < 1e-12);
        assert!((across - 10.0 * (FRAC_PI_2 + ALIGNMENT_FLOOR)).abs() < 1e-9);
        assert_eq!(line_cost((1.0, 1.0), Some(0.3), (1.0, 1.0)), 0.0);
        assert!((line_cost((0.0, 0.0), None, (3.0, 4.0)) - 5.0 * 1.01).abs() < 1e-12);
    }
}
