//! Classification of pixels against a trained model.

mod model;

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LayoutError, Result};
use crate::features::{FeatureContext, features};
use crate::label::{LabelInfo, LabelManager, PixelLabel};
use crate::pixel::{PixelArena, PixelId, PixelSet};

pub use model::{DecisionTree, MODEL_FORMAT_VERSION, ModelKind, SuperPixelModel, TreeNode};

/// Outcome of classifying one descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: LabelInfo,
    /// Index of `label` in the model vocabulary.
    pub label_index: usize,
    pub confidence: f64,
    /// One probability per vocabulary entry.
    pub probabilities: Vec<f64>,
}

impl Prediction {
    pub fn to_pixel_label(&self) -> PixelLabel {
        PixelLabel::new(self.label.clone(), self.confidence)
    }
}

/// Maps a feature vector to label probabilities.
pub trait Classifier: Send + Sync {
    fn feature_dim(&self) -> usize;

    fn labels(&self) -> &LabelManager;

    fn probabilities(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Most likely label; ties resolve to the lowest vocabulary index.
    fn classify(&self, features: &[f64]) -> Result<Prediction> {
        let probabilities = self.probabilities(features)?;
        if probabilities.is_empty() || probabilities.len() != self.labels().len() {
            return Err(LayoutError::InvalidModel(format!(
                "classifier returned {} probabilities for {} labels",
                probabilities.len(),
                self.labels().len()
            )));
        }
        let mut best = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[best] {
                best = i;
            }
        }
        let label = self
            .labels()
            .get(best)
            .cloned()
            .ok_or(LayoutError::UnknownLabel(best as u32))?;
        Ok(Prediction {
            label,
            label_index: best,
            confidence: probabilities[best],
            probabilities,
        })
    }
}

/// Classifier backed by a shared, read-only [`SuperPixelModel`].
#[derive(Debug, Clone)]
pub struct SuperPixelClassifier {
    model: Arc<SuperPixelModel>,
    labels: LabelManager,
}

impl SuperPixelClassifier {
    pub fn new(model: Arc<SuperPixelModel>) -> Result<Self> {
        let labels = LabelManager::from_labels(model.labels().iter().cloned())?;
        if labels.len() != model.num_labels() {
            return Err(LayoutError::InvalidModel(format!(
                "model has {} labels, vocabulary resolves to {}",
                model.num_labels(),
                labels.len()
            )));
        }
        Ok(Self { model, labels })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(Arc::new(SuperPixelModel::from_json(json)?))
    }

    /// Like [`new`](Self::new), additionally checking the model against the
    /// descriptor length produced by the caller's feature extraction.
    pub fn with_feature_dim(model: Arc<SuperPixelModel>, feature_dim: usize) -> Result<Self> {
        if model.feature_dim() != feature_dim {
            return Err(LayoutError::DimensionMismatch {
                expected: model.feature_dim(),
                got: feature_dim,
                pixel: None,
            });
        }
        Self::new(model)
    }

    pub fn model(&self) -> &Arc<SuperPixelModel> {
        &self.model
    }
}

impl Classifier for SuperPixelClassifier {
    fn feature_dim(&self) -> usize {
        self.model.feature_dim()
    }

    fn labels(&self) -> &LabelManager {
        &self.labels
    }

    fn probabilities(&self, features: &[f64]) -> Result<Vec<f64>> {
        self.model.predict(features)
    }
}

/// Classifies every member of `set` independently, in parallel.
///
/// Results follow set order. A dimension mismatch names the offending pixel.
pub fn classify_set<C: Classifier + ?Sized>(
    classifier: &C,
    set: &PixelSet,
    ctx: &FeatureContext<'_>,
) -> Result<Vec<Prediction>> {
    ctx.arena.check_set(set)?;
    let ids = set.to_vec();
    let predictions = ids
        .par_iter()
        .map(|&id| {
            let f = features(&ctx.arena[id], ctx);
            classifier.classify(&f).map_err(|e| with_pixel(e, id))
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(pixels = predictions.len(), "classified pixel set");
    Ok(predictions)
}

/// Classifies precomputed descriptors, one row per member of `set`.
pub fn classify_rows<C: Classifier + ?Sized>(
    classifier: &C,
    set: &PixelSet,
    rows: &[Vec<f64>],
) -> Result<Vec<Prediction>> {
    if rows.len() != set.len() {
        return Err(LayoutError::LabelCountMismatch {
            expected: set.len(),
            got: rows.len(),
        });
    }
    set.iter()
        .zip(rows)
        .collect::<Vec<_>>()
        .par_iter()
        .map(|(id, row)| classifier.classify(row).map_err(|e| with_pixel(e, *id)))
        .collect()
}

/// Stores each prediction as the label of its pixel.
pub fn apply_predictions(arena: &mut PixelArena, set: &PixelSet, predictions: &[Prediction]) {
    for (id, prediction) in set.iter().zip(predictions) {
        arena.set_label(id, prediction.to_pixel_label());
    }
}

fn with_pixel(err: LayoutError, id: PixelId) -> LayoutError {
    match err {
        LayoutError::DimensionMismatch { expected, got, .. } => LayoutError::DimensionMismatch {
            expected,
            got,
            pixel: Some(id),
        },
        other => other,
    }
}
