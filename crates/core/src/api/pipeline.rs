//! End-to-end labeling of pixel sets.
//!
//! Connect → build graph → extract features → classify → refine. Results are
//! plain values; nothing is written to the arena until
//! [`RegionResult::apply`] is called.

use image::GrayImage;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::classify::{Classifier, Prediction, classify_set};
use crate::connect::Connector;
use crate::error::{LayoutError, Result};
use crate::features::FeatureContext;
use crate::graph::PixelGraph;
use crate::graphcut::{Refinement, refine_labels};
use crate::label::{LabelInfo, PixelLabel};
use crate::params::LayoutParams;
use crate::pixel::{PixelArena, PixelSet};

pub(crate) fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Labeling of one pixel set.
#[derive(Debug, Clone)]
pub struct RegionResult {
    graph: PixelGraph,
    predictions: Vec<Prediction>,
    labels: Vec<PixelLabel>,
    refinement: Option<Refinement>,
}

impl RegionResult {
    pub fn graph(&self) -> &PixelGraph {
        &self.graph
    }

    pub fn set(&self) -> &PixelSet {
        self.graph.set()
    }

    /// Raw classifier output, in set order.
    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    /// Final labels, in set order.
    pub fn labels(&self) -> &[PixelLabel] {
        &self.labels
    }

    pub fn refinement(&self) -> Option<&Refinement> {
        self.refinement.as_ref()
    }

    /// Pixels whose final label differs from the classifier's choice.
    pub fn changed(&self) -> usize {
        self.predictions
            .iter()
            .zip(&self.labels)
            .filter(|(p, l)| p.label.id != l.label.id)
            .count()
    }

    /// Stores the final labels on the arena's pixels.
    pub fn apply(&self, arena: &mut PixelArena) {
        for (id, label) in self.graph.set().iter().zip(&self.labels) {
            arena.set_label(id, label.clone());
        }
    }

    /// Connected groups of equally labeled pixels, following the graph's
    /// edges. Ordered by each group's first member.
    pub fn label_sets(&self) -> Vec<(LabelInfo, PixelSet)> {
        let set = self.graph.set();
        let label_of = |id| set.position(id).map(|pos| self.labels[pos].label.id);
        self.graph
            .components_by(|e| label_of(e.first()) == label_of(e.second()))
            .into_iter()
            .filter_map(|component| {
                let first = component.get(0)?;
                let pos = set.position(first)?;
                Some((self.labels[pos].label.clone(), component))
            })
            .collect()
    }
}

/// Runs the labeling pipeline with one configuration and classifier.
pub struct SuperPixelClassification<'a, C: Classifier + ?Sized> {
    arena: &'a PixelArena,
    classifier: &'a C,
    params: &'a LayoutParams,
    image: Option<&'a GrayImage>,
}

impl<'a, C: Classifier + ?Sized> SuperPixelClassification<'a, C> {
    pub fn new(arena: &'a PixelArena, classifier: &'a C, params: &'a LayoutParams) -> Self {
        Self {
            arena,
            classifier,
            params,
            image: None,
        }
    }

    /// Image the pixels were extracted from, for gradient features.
    pub fn with_image(mut self, image: &'a GrayImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Labels a single region.
    pub fn analyze(&self, set: &PixelSet) -> Result<RegionResult> {
        self.params.validate()?;
        self.analyze_unchecked(set)
    }

    fn analyze_unchecked(&self, set: &PixelSet) -> Result<RegionResult> {
        let connector = Connector::from_params(&self.params.connector, &self.params.dbscan);
        let graph = PixelGraph::build(self.arena, set.clone(), &connector)?;

        let mut ctx = FeatureContext::new(self.arena).with_graph(&graph);
        ctx.image = self.image;
        let predictions = classify_set(self.classifier, set, &ctx)?;

        let refinement = if self.params.graphcut.enabled {
            Some(refine_labels(&graph, self.arena, &predictions, &self.params.graphcut)?)
        } else {
            None
        };

        let vocabulary = self.classifier.labels();
        let labels = predictions
            .iter()
            .enumerate()
            .map(|(pos, prediction)| {
                let idx = refinement.as_ref().map_or(prediction.label_index, |r| r.labels[pos]);
                let label = vocabulary
                    .get(idx)
                    .cloned()
                    .ok_or(LayoutError::UnknownLabel(idx as u32))?;
                let confidence = prediction.probabilities.get(idx).copied().unwrap_or(0.0);
                Ok(PixelLabel::new(label, confidence))
            })
            .collect::<Result<Vec<_>>>()?;

        let result = RegionResult {
            graph,
            predictions,
            labels,
            refinement,
        };
        debug!(
            connector = ?self.params.connector.kind,
            pixels = set.len(),
            edges = result.graph.num_edges(),
            changed = result.changed(),
            "analyzed region"
        );
        Ok(result)
    }

    /// Labels independent regions in parallel; results follow input order.
    pub fn analyze_regions(&self, sets: &[PixelSet]) -> Result<Vec<RegionResult>> {
        self.params.validate()?;
        let threads = self.params.num_threads.unwrap_or_else(default_thread_count);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| LayoutError::ThreadPool(e.to_string()))?;

        let mut results: Vec<(usize, Result<RegionResult>)> = pool.install(|| {
            sets.par_iter()
                .enumerate()
                .map(|(idx, set)| (idx, self.analyze_unchecked(set)))
                .collect()
        });
        results.sort_by_key(|(idx, _)| *idx);

        let results = results.into_iter().map(|(_, r)| r).collect::<Result<Vec<_>>>()?;
        info!(
            regions = results.len(),
            pixels = results.iter().map(|r| r.set().len()).sum::<usize>(),
            threads,
            "analyzed regions"
        );
        Ok(results)
    }
}
