//! Global label refinement by energy minimization over a [`PixelGraph`].
//!
//! Unary costs come from classifier probabilities, pairwise costs from the
//! graph's edges: strongly connected pixels (small edge weight) pay more for
//! disagreeing labels. The same engine smooths orientations
//! ([`refine_orientations`]) and reassigns pixels between text lines
//! ([`refine_text_lines`]).

mod energy;
mod expansion;
mod maxflow;
mod orientation;
mod textline;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::Prediction;
use crate::error::{LayoutError, Result};
use crate::graph::PixelGraph;
use crate::pixel::{EdgeWeight, PixelArena};

pub use energy::{Energy, MIN_PROBABILITY, PairTerm, Smoothness, UnaryCosts};
pub use expansion::{AlphaExpansion, Refinement};
pub use maxflow::FlowGraph;
pub use orientation::refine_orientations;
pub use textline::refine_text_lines;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphCutParams {
    /// Run the refinement at all.
    pub enabled: bool,
    pub smoothness: Smoothness,
    pub smoothness_weight: f64,
    pub edge_weight: EdgeWeight,
    pub max_sweeps: usize,
    pub time_budget_ms: Option<u64>,
}

impl Default for GraphCutParams {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothness: Smoothness::default(),
            smoothness_weight: 1.0,
            edge_weight: EdgeWeight::Edge,
            max_sweeps: 2,
            time_budget_ms: None,
        }
    }
}

impl GraphCutParams {
    pub fn expansion(&self) -> AlphaExpansion {
        AlphaExpansion {
            max_sweeps: self.max_sweeps,
            time_budget: self.time_budget_ms.map(Duration::from_millis),
        }
    }
}

/// Pairwise terms from the graph's edges: `(1 - weight) * smoothness_weight`,
/// indexed by set position.
pub fn pair_terms(
    graph: &PixelGraph,
    arena: &PixelArena,
    params: &GraphCutParams,
) -> Result<Vec<PairTerm>> {
    let mut pairs = Vec::with_capacity(graph.num_edges());
    for edge in graph.edges() {
        let a = graph
            .pixel_index(edge.first())
            .ok_or(LayoutError::UnknownPixel(edge.first()))?;
        let b = graph
            .pixel_index(edge.second())
            .ok_or(LayoutError::UnknownPixel(edge.second()))?;
        if a == b {
            continue;
        }
        let weight = (1.0 - params.edge_weight.weight(edge, arena)) * params.smoothness_weight;
        if weight > 0.0 {
            pairs.push(PairTerm { a, b, weight });
        }
    }
    Ok(pairs)
}

/// Refines classifier output over `graph`.
///
/// `predictions` follow the graph's set order; the classifier's argmax is
/// the starting labeling.
pub fn refine_labels(
    graph: &PixelGraph,
    arena: &PixelArena,
    predictions: &[Prediction],
    params: &GraphCutParams,
) -> Result<Refinement> {
    if predictions.len() != graph.num_pixels() {
        return Err(LayoutError::LabelCountMismatch {
            expected: graph.num_pixels(),
            got: predictions.len(),
        });
    }
    arena.check_set(graph.set())?;
    let num_labels = predictions.first().map(|p| p.probabilities.len()).unwrap_or(0);
    let mut unary = UnaryCosts::new(num_labels);
    for p in predictions {
        unary.push_probabilities(&p.probabilities)?;
    }
    let initial: Vec<usize> = predictions.iter().map(|p| p.label_index).collect();

    let energy = Energy::new(unary, pair_terms(graph, arena, params)?, params.smoothness.clone());
    let result = params.expansion().minimize(&energy, initial)?;
    debug!(
        pixels = graph.num_pixels(),
        pairs = energy.pairs.len(),
        sweeps = result.sweeps,
        initial_energy = result.initial_energy,
        energy = result.energy,
        "label refinement"
    );
    Ok(result)
}
