//! Alpha-expansion: multi-label minimization by iterated binary min-cuts.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::energy::Energy;
use super::maxflow::FlowGraph;
use crate::error::{LayoutError, Result};

/// Outcome of a refinement run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub labels: Vec<usize>,
    pub energy: f64,
    pub initial_energy: f64,
    /// Energy after each completed sweep.
    pub energy_trace: Vec<f64>,
    pub sweeps: usize,
    /// True once a full sweep found no improving expansion.
    pub converged: bool,
    /// True if the time budget stopped the run early.
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaExpansion {
    pub max_sweeps: usize,
    pub time_budget: Option<Duration>,
}

impl Default for AlphaExpansion {
    fn default() -> Self {
        Self {
            max_sweeps: 2,
            time_budget: None,
        }
    }
}

impl AlphaExpansion {
    pub fn new(max_sweeps: usize) -> Self {
        Self {
            max_sweeps,
            time_budget: None,
        }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Minimizes `energy` starting from `initial`.
    ///
    /// The smoothness term is validated before anything else runs. Without
    /// pairwise terms the result is the per-node minimum; with a single label
    /// or zero sweeps no max-flow is computed.
    pub fn minimize(&self, energy: &Energy, initial: Vec<usize>) -> Result<Refinement> {
        energy.validate()?;
        let n = energy.num_nodes();
        let num_labels = energy.num_labels();
        if initial.len() != n {
            return Err(LayoutError::LabelCountMismatch {
                expected: n,
                got: initial.len(),
            });
        }
        if let Some(&bad) = initial.iter().find(|&&l| l >= num_labels) {
            return Err(LayoutError::LabelCountMismatch {
                expected: num_labels,
                got: bad + 1,
            });
        }

        let initial_energy = energy.evaluate(&initial);
        let done = |labels: Vec<usize>, converged: bool| {
            let e = energy.evaluate(&labels);
            Refinement {
                labels,
                energy: e,
                initial_energy,
                energy_trace: Vec::new(),
                sweeps: 0,
                converged,
                timed_out: false,
            }
        };

        if self.max_sweeps == 0 {
            return Ok(done(initial, false));
        }
        if num_labels <= 1 {
            return Ok(done(initial, true));
        }
        if energy.pairs.is_empty() {
            let labels = energy.unary.argmin();
            // argmin cannot be worse than the start
            let labels = if energy.evaluate(&labels) < initial_energy { labels } else { initial };
            return Ok(done(labels, true));
        }

        let started = Instant::now();
        let mut labels = initial;
        let mut current = initial_energy;
        let mut trace = Vec::with_capacity(self.max_sweeps);
        let mut converged = false;
        let mut timed_out = false;
        let mut sweeps = 0;

        while sweeps < self.max_sweeps {
            if let Some(budget) = self.time_budget {
                if started.elapsed() >= budget {
                    timed_out = true;
                    break;
                }
            }
            let mut improved = false;
            for alpha in 0..num_labels {
                if let Some((candidate, e)) = expand(energy, &labels, alpha) {
                    if e < current - 1e-12 * current.abs().max(1.0) {
                        labels = candidate;
                        current = e;
                        improved = true;
                    }
                }
            }
            sweeps += 1;
            trace.push(current);
            debug!(sweep = sweeps, energy = current, improved, "alpha expansion sweep");
            if !improved {
                converged = true;
                break;
            }
        }

        Ok(Refinement {
            labels,
            energy: current,
            initial_energy,
            energy_trace: trace,
            sweeps,
            converged,
            timed_out,
        })
    }
}

/// Best alpha-expansion of `labels`; `None` if no node would change.
fn expand(energy: &Energy, labels: &[usize], alpha: usize) -> Option<(Vec<usize>, f64)> {
    let n = labels.len();
    if labels.iter().all(|&l| l == alpha) {
        return None;
    }

    // x = 0 keeps the current label, x = 1 switches to alpha
    let mut keep: Vec<f64> = (0..n).map(|i| energy.unary.cost(i, labels[i])).collect();
    let mut take: Vec<f64> = (0..n).map(|i| energy.unary.cost(i, alpha)).collect();
    let mut graph = FlowGraph::new(n);

    for pair in &energy.pairs {
        let (i, j) = (pair.a, pair.b);
        if i == j {
            continue;
        }
        let a = energy.pairwise(pair, labels[i], labels[j]);
        let b = energy.pairwise(pair, labels[i], alpha);
        let c = energy.pairwise(pair, alpha, labels[j]);
        let d = energy.pairwise(pair, alpha, alpha);
        // E = A + (C - A) x_i + (D - C) x_j + (B + C - A - D) (1 - x_i) x_j
        keep[i] += a;
        take[i] += c;
        take[j] += d - c;
        graph.add_edge(i, j, (b + c - a - d).max(0.0), 0.0);
    }
    for i in 0..n {
        graph.add_terminal_weights(i, take[i], keep[i]);
    }
    graph.max_flow();

    let candidate: Vec<usize> = (0..n)
        .map(|i| if graph.in_source_set(i) { labels[i] } else { alpha })
        .collect();
    if candidate == labels {
        return None;
    }
    let e = energy.evaluate(&candidate);
    Some((candidate, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphcut::energy::{PairTerm, Smoothness, UnaryCosts};

    fn chain_energy(weight: f64) -> Energy {
        // the middle node weakly prefers label 1, its neighbours strongly prefer 0
        let unary = UnaryCosts::from_rows(2, &[[0.0, 5.0], [1.0, 0.5], [0.0, 5.0]]).unwrap();
        let pairs = vec![
            PairTerm { a: 0, b: 1, weight },
            PairTerm { a: 1, b: 2, weight },
        ];
        Energy::new(unary, pairs, Smoothness::default())
    }

    #[test]
    fn test_smoothing_flips_weak_node() {
        let energy = chain_energy(1.0);
        let result = AlphaExpansion::new(5).minimize(&energy, vec![0, 1, 0]).unwrap();
        assert_eq!(result.labels, vec![0, 0, 0]);
        assert!(result.energy < result.initial_energy);
        assert!(result.converged);
        assert!(result.energy_trace.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_zero_sweeps_returns_initial_labels() {
        let energy = chain_energy(1.0);
        let result = AlphaExpansion::new(0).minimize(&energy, vec![0, 1, 0]).unwrap();
        assert_eq!(result.labels, vec![0, 1, 0]);
        assert_eq!(result.sweeps, 0);
    }

    #[test]
    fn test_weak_smoothness_keeps_labels() {
        let energy = chain_energy(0.1);
        let result = AlphaExpansion::new(5).minimize(&energy, vec![0, 1, 0]).unwrap();
        assert_eq!(result.labels, vec![0, 1, 0]);
        assert_eq!(result.energy, result.initial_energy);
    }

    #[test]
    fn test_invalid_initial_labels() {
        let energy = chain_energy(1.0);
        assert!(AlphaExpansion::new(1).minimize(&energy, vec![0, 1]).is_err());
        assert!(AlphaExpansion::new(1).minimize(&energy, vec![0, 2, 0]).is_err());
    }
}
