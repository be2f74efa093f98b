//! Trained model artifact.
//!
//! A model is a versioned JSON document holding the feature dimensionality,
//! the label vocabulary and the weights of either a softmax-linear model or
//! a random forest. Models are validated once on load and never mutated.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::label::{LabelInfo, LabelManager};

/// Format version written by [`SuperPixelModel::to_json`].
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// `feature < threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-label votes, one per vocabulary entry.
    Leaf { votes: Vec<f64> },
}

/// A decision tree stored as a node array with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn leaf(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0;
        // children always point forward, so this terminates
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { votes } => return votes,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    fn validate(&self, tree: usize, feature_dim: usize, num_labels: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(LayoutError::InvalidModel(format!("tree {tree} has no nodes")));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    threshold,
                } => {
                    if *feature >= feature_dim {
                        return Err(LayoutError::InvalidModel(format!(
                            "tree {tree} node {idx} splits on feature {feature}, \
                             model has {feature_dim}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(LayoutError::InvalidModel(format!(
                            "tree {tree} node {idx} has a non-finite threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(LayoutError::InvalidModel(format!(
                                "tree {tree} node {idx} has invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { votes } => {
                    if votes.len() != num_labels {
                        return Err(LayoutError::InvalidModel(format!(
                            "tree {tree} leaf {idx} has {} votes for {num_labels} labels",
                            votes.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    /// `softmax(W x + b)`, one weight row per label.
    Linear { weights: Vec<Vec<f64>>, bias: Vec<f64> },
    /// Mean of the trees' normalized leaf votes.
    Forest { trees: Vec<DecisionTree> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperPixelModel {
    version: u32,
    feature_dim: usize,
    labels: Vec<LabelInfo>,
    model: ModelKind,
}

impl SuperPixelModel {
    pub fn new(feature_dim: usize, labels: Vec<LabelInfo>, model: ModelKind) -> Result<Self> {
        let model = Self {
            version: MODEL_FORMAT_VERSION,
            feature_dim,
            labels,
            model,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn labels(&self) -> &[LabelInfo] {
        &self.labels
    }

    pub fn kind(&self) -> &ModelKind {
        &self.model
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    fn validate(&self) -> Result<()> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(LayoutError::UnsupportedModelVersion {
                found: self.version,
                expected: MODEL_FORMAT_VERSION,
            });
        }
        if self.feature_dim == 0 {
            return Err(LayoutError::InvalidModel("feature dimension is zero".into()));
        }
        if self.labels.is_empty() {
            return Err(LayoutError::InvalidModel("empty label vocabulary".into()));
        }
        for (idx, label) in self.labels.iter().enumerate() {
            if let Some(prev) = self.labels[..idx].iter().position(|l| l.id == label.id) {
                return Err(LayoutError::InvalidModel(format!(
                    "label id {} appears at vocabulary entries {prev} and {idx}",
                    label.id
                )));
            }
        }
        LabelManager::from_labels(self.labels.iter().cloned())?;

        let n = self.labels.len();
        match &self.model {
            ModelKind::Linear { weights, bias } => {
                if weights.len() != n || bias.len() != n {
                    return Err(LayoutError::InvalidModel(format!(
                        "linear model has {} weight rows and {} biases for {n} labels",
                        weights.len(),
                        bias.len()
                    )));
                }
                for row in weights {
                    if row.len() != self.feature_dim {
                        return Err(LayoutError::DimensionMismatch {
                            expected: self.feature_dim,
                            got: row.len(),
                            pixel: None,
                        });
                    }
                }
            }
            ModelKind::Forest { trees } => {
                if trees.is_empty() {
                    return Err(LayoutError::InvalidModel("forest has no trees".into()));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(i, self.feature_dim, n)?;
                }
            }
        }
        Ok(())
    }

    /// Label probabilities for `features`, in vocabulary order.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.feature_dim {
            return Err(LayoutError::DimensionMismatch {
                expected: self.feature_dim,
                got: features.len(),
                pixel: None,
            });
        }
        let probs = match &self.model {
            ModelKind::Linear { weights, bias } => {
                let scores: Vec<f64> = weights
                    .iter()
                    .zip(bias)
                    .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
                    .collect();
                softmax(&scores)
            }
            ModelKind::Forest { trees } => {
                let mut acc = vec![0.0; self.labels.len()];
                for tree in trees {
                    let votes = tree.leaf(features);
                    let total: f64 = votes.iter().map(|v| v.max(0.0)).sum();
                    if total > 0.0 {
                        for (a, v) in acc.iter_mut().zip(votes) {
                            *a += v.max(0.0) / total;
                        }
                    }
                }
                let sum: f64 = acc.iter().sum();
                if sum > 0.0 {
                    acc.iter_mut().for_each(|a| *a /= sum);
                } else {
                    let uniform = 1.0 / acc.len() as f64;
                    acc.iter_mut().for_each(|a| *a = uniform);
                }
                acc
            }
        };
        Ok(probs)
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> SuperPixelModel {
        SuperPixelModel::new(
            2,
            vec![LabelInfo::background(), LabelInfo::text()],
            ModelKind::Linear {
                weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                bias: vec![0.0, 0.0],
            },
        )
        .unwrap()
    }

    #[test]
    fn test_linear_softmax() {
        let p = linear().predict(&[2.0, 0.0]).unwrap();
        let e = 2.0f64.exp();
        assert!((p[0] - e / (e + 1.0)).abs() < 1e-12);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_round_trip_and_version_check() {
        let model = linear();
        let json = model.to_json().unwrap();
        assert_eq!(SuperPixelModel::from_json(&json).unwrap(), model);

        let newer = json.replacen("\"version\": 1", "\"version\": 2", 1);
        assert!(matches!(
            SuperPixelModel::from_json(&newer),
            Err(LayoutError::UnsupportedModelVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_forest_votes() {
        let tree = DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { votes: vec![3.0, 1.0] },
                TreeNode::Leaf { votes: vec![0.0, 2.0] },
            ],
        };
        let model = SuperPixelModel::new(
            1,
            vec![LabelInfo::background(), LabelInfo::text()],
            ModelKind::Forest { trees: vec![tree] },
        )
        .unwrap();
        assert_eq!(model.predict(&[0.0]).unwrap(), vec![0.75, 0.25]);
        assert_eq!(model.predict(&[1.0]).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_invalid_trees_are_rejected() {
        let cyclic = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.5,
                left: 0,
                right: 0,
            }],
        };
        let forest = ModelKind::Forest { trees: vec![cyclic] };
        let err = SuperPixelModel::new(1, vec![LabelInfo::text()], forest);
        assert!(matches!(err, Err(LayoutError::InvalidModel(_))));
    }
}
