//! Labeling energy: unary costs plus weighted pairwise smoothness.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::utils::EPSILON;

/// Probabilities are floored here before taking the negative log.
pub const MIN_PROBABILITY: f64 = 1e-6;

/// Pairwise label cost `V(a, b)`.
///
/// Alpha-expansion needs `V` to be a metric; [`Smoothness::validate`]
/// checks that before any optimization runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Smoothness {
    /// 0 for equal labels, `penalty` otherwise.
    Potts { penalty: f64 },
    /// Cyclic distance `min(|a - b|, L - |a - b|)` for orientation labels.
    Circular,
    /// Explicit `L x L` cost table.
    Matrix { costs: Vec<Vec<f64>> },
}

impl Default for Smoothness {
    fn default() -> Self {
        Self::Potts { penalty: 1.0 }
    }
}

impl Smoothness {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "potts" => Some(Self::default()),
            "circular" => Some(Self::Circular),
            _ => None,
        }
    }

    pub fn cost(&self, a: usize, b: usize, num_labels: usize) -> f64 {
        match self {
            Self::Potts { penalty } => {
                if a == b {
                    0.0
                } else {
                    *penalty
                }
            }
            Self::Circular => {
                let d = a.abs_diff(b);
                d.min(num_labels.saturating_sub(d)) as f64
            }
            Self::Matrix { costs } => costs[a][b],
        }
    }

    /// Checks that `V` is a metric over `num_labels` labels:
    /// `V(a, a) = 0`, `V(a, b) = V(b, a) >= 0` and
    /// `V(a, c) <= V(a, b) + V(b, c)`.
    pub fn validate(&self, num_labels: usize) -> Result<()> {
        if let Self::Matrix { costs } = self {
            if costs.len() != num_labels || costs.iter().any(|row| row.len() != num_labels) {
                return Err(LayoutError::LabelCountMismatch {
                    expected: num_labels,
                    got: costs.len(),
                });
            }
        }
        let v = |a, b| self.cost(a, b, num_labels);
        for a in 0..num_labels {
            if v(a, a).abs() > EPSILON {
                return Err(non_metric(a, a, a, "V(a, a) must be zero"));
            }
            for b in 0..num_labels {
                let ab = v(a, b);
                if !ab.is_finite() || ab < 0.0 {
                    return Err(non_metric(a, b, b, "costs must be finite and non-negative"));
                }
                if (ab - v(b, a)).abs() > EPSILON {
                    return Err(non_metric(a, b, a, "costs must be symmetric"));
                }
                for c in 0..num_labels {
                    if v(a, c) > ab + v(b, c) + EPSILON {
                        return Err(non_metric(a, b, c, "triangle inequality violated"));
                    }
                }
            }
        }
        Ok(())
    }
}

fn non_metric(a: usize, b: usize, c: usize, reason: &'static str) -> LayoutError {
    LayoutError::NonSubmodular { a, b, c, reason }
}

/// Per-node label costs, row-major `num_nodes x num_labels`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryCosts {
    num_labels: usize,
    costs: Vec<f64>,
}

impl UnaryCosts {
    pub fn new(num_labels: usize) -> Self {
        Self {
            num_labels,
            costs: Vec::new(),
        }
    }

    /// Appends one node; `costs` must have one entry per label.
    pub fn push(&mut self, costs: &[f64]) -> Result<()> {
        if costs.len() != self.num_labels {
            return Err(LayoutError::LabelCountMismatch {
                expected: self.num_labels,
                got: costs.len(),
            });
        }
        self.costs.extend_from_slice(costs);
        Ok(())
    }

    /// `-ln(max(p, MIN_PROBABILITY))` per label.
    pub fn push_probabilities(&mut self, probabilities: &[f64]) -> Result<()> {
        let costs: Vec<f64> = probabilities
            .iter()
            .map(|p| -(p.max(MIN_PROBABILITY)).ln())
            .collect();
        self.push(&costs)
    }

    pub fn from_rows<R: AsRef<[f64]>>(num_labels: usize, rows: &[R]) -> Result<Self> {
        let mut unary = Self::new(num_labels);
        for row in rows {
            unary.push(row.as_ref())?;
        }
        Ok(unary)
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn num_nodes(&self) -> usize {
        if self.num_labels == 0 {
            0
        } else {
            self.costs.len() / self.num_labels
        }
    }

    pub fn cost(&self, node: usize, label: usize) -> f64 {
        self.costs[node * self.num_labels + label]
    }

    /// Cheapest label per node; ties go to the lowest label.
    pub fn argmin(&self) -> Vec<usize> {
        (0..self.num_nodes())
            .map(|node| {
                let mut best = 0;
                for l in 1..self.num_labels {
                    if self.cost(node, l) < self.cost(node, best) {
                        best = l;
                    }
                }
                best
            })
            .collect()
    }
}

/// Pairwise term between two nodes, scaled by `weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTerm {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

/// `E(l) = Σ unary(i, l_i) + Σ w_ij V(l_i, l_j)`.
#[derive(Debug, Clone)]
pub struct Energy {
    pub unary: UnaryCosts,
    pub pairs: Vec<PairTerm>,
    pub smoothness: Smoothness,
}

impl Energy {
    pub fn new(unary: UnaryCosts, pairs: Vec<PairTerm>, smoothness: Smoothness) -> Self {
        Self {
            unary,
            pairs,
            smoothness,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.unary.num_nodes()
    }

    pub fn num_labels(&self) -> usize {
        self.unary.num_labels()
    }

    pub fn pairwise(&self, pair: &PairTerm, la: usize, lb: usize) -> f64 {
        pair.weight * self.smoothness.cost(la, lb, self.num_labels())
    }

    /// Total energy of `labels`.
    pub fn evaluate(&self, labels: &[usize]) -> f64 {
        let unary: f64 = labels
            .iter()
            .enumerate()
            .map(|(node, &l)| self.unary.cost(node, l))
            .sum();
        let pairwise: f64 = self
            .pairs
            .iter()
            .map(|p| self.pairwise(p, labels[p.a], labels[p.b]))
            .sum();
        unary + pairwise
    }

    /// Validates label ranges, node indices and the smoothness term.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes();
        for p in &self.pairs {
            if p.a >= n || p.b >= n {
                return Err(LayoutError::LabelCountMismatch {
                    expected: n,
                    got: p.a.max(p.b) + 1,
                });
            }
            if !p.weight.is_finite() || p.weight < 0.0 {
                return Err(LayoutError::InvalidParameter {
                    name: "smoothness_weight",
                    value: p.weight.to_string(),
                    reason: "pairwise weights must be finite and non-negative",
                });
            }
        }
        self.smoothness.validate(self.num_labels())
    }
}
