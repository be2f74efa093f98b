//! End-to-end tests for region analysis.

use std::sync::Arc;

use superpix_core::api::SuperPixelClassification;
use superpix_core::classify::{ModelKind, SuperPixelClassifier, SuperPixelModel};
use superpix_core::error::LayoutError;
use superpix_core::features::FEATURE_DIM;
use superpix_core::label::LabelInfo;
use superpix_core::params::LayoutParams;
use superpix_core::pixel::{PixelArena, PixelSet, PixelStats};
use superpix_core::utils::Ellipse;

fn classifier() -> SuperPixelClassifier {
    // round shapes are background, elongated ones text
    let mut background = vec![0.0; FEATURE_DIM];
    background[0] = 6.0;
    let model = SuperPixelModel::new(
        FEATURE_DIM,
        vec![LabelInfo::background(), LabelInfo::text()],
        ModelKind::Linear {
            weights: vec![background, vec![0.0; FEATURE_DIM]],
            bias: vec![0.0, 3.0],
        },
    )
    .unwrap();
    SuperPixelClassifier::new(Arc::new(model)).unwrap()
}

/// A line of words starting at `(x0, y)` followed by a round blob.
fn line(arena: &mut PixelArena, x0: f64, y: f64) -> PixelSet {
    let mut set = PixelSet::new();
    for i in 0..4 {
        let x = x0 + i as f64 * 12.0;
        let bbox = (x - 5.0, y - 1.0, x + 5.0, y + 1.0);
        let id = arena.push(Ellipse::new((x, y), (5.0, 1.0), 0.0), bbox);
        arena.set_stats(id, PixelStats::new(0.0, 10.0));
        set.add(id);
    }
    let x = x0 + 60.0;
    let bbox = (x - 3.0, y - 3.0, x + 3.0, y + 3.0);
    let id = arena.push(Ellipse::new((x, y), (3.0, 3.0), 0.0), bbox);
    arena.set_stats(id, PixelStats::new(0.0, 10.0));
    set.add(id);
    set
}

#[test]
fn test_analyze_labels_every_pixel() {
    let mut arena = PixelArena::new();
    let set = line(&mut arena, 0.0, 0.0);
    let classifier = classifier();
    let params = LayoutParams::default();

    let result = SuperPixelClassification::new(&arena, &classifier, &params)
        .analyze(&set)
        .unwrap();
    assert_eq!(result.labels().len(), set.len());
    assert_eq!(result.predictions().len(), set.len());
    assert!(result.refinement().is_some());
    assert!(result.graph().num_edges() > 0);
    for label in &result.labels()[..4] {
        assert_eq!(label.label, LabelInfo::text());
    }

    result.apply(&mut arena);
    for (id, label) in set.iter().zip(result.labels()) {
        assert_eq!(arena[id].label(), Some(label));
    }
}

#[test]
fn test_refinement_disabled_keeps_predictions() {
    let mut arena = PixelArena::new();
    let set = line(&mut arena, 0.0, 0.0);
    let classifier = classifier();
    let params =
        LayoutParams::from_options([("refine", "false"), ("connector", "region")]).unwrap();

    let result = SuperPixelClassification::new(&arena, &classifier, &params)
        .analyze(&set)
        .unwrap();
    assert!(result.refinement().is_none());
    assert_eq!(result.changed(), 0);
    for (p, l) in result.predictions().iter().zip(result.labels()) {
        assert_eq!(p.label, l.label);
        assert_eq!(p.confidence, l.confidence);
    }
}

#[test]
fn test_label_sets_group_connected_equal_labels() {
    let mut arena = PixelArena::new();
    let set = line(&mut arena, 0.0, 0.0);
    let classifier = classifier();
    let params = LayoutParams::from_options([("refine", "false")]).unwrap();

    let result = SuperPixelClassification::new(&arena, &classifier, &params)
        .analyze(&set)
        .unwrap();
    let groups = result.label_sets();
    let covered: usize = groups.iter().map(|(_, s)| s.len()).sum();
    assert_eq!(covered, set.len());
    assert_eq!(groups[0].0, LabelInfo::text());
    assert_eq!(groups[0].1.len(), 4);
}

#[test]
fn test_regions_keep_input_order() {
    let mut arena = PixelArena::new();
    let regions: Vec<PixelSet> = (0..6).map(|i| line(&mut arena, 0.0, i as f64 * 200.0)).collect();
    let classifier = classifier();
    let mut params = LayoutParams::default();
    params.num_threads = Some(3);

    let pipeline = SuperPixelClassification::new(&arena, &classifier, &params);
    let results = pipeline.analyze_regions(&regions).unwrap();
    assert_eq!(results.len(), regions.len());
    for (region, result) in regions.iter().zip(&results) {
        assert_eq!(result.set(), region);
    }

    // parallel runs match single-region runs
    let single = pipeline.analyze(&regions[2]).unwrap();
    assert_eq!(single.labels(), results[2].labels());
}

#[test]
fn test_invalid_params_are_reported() {
    let mut arena = PixelArena::new();
    let set = line(&mut arena, 0.0, 0.0);
    let classifier = classifier();
    let mut params = LayoutParams::default();
    params.dbscan.min_pts = 0;

    let err = SuperPixelClassification::new(&arena, &classifier, &params)
        .analyze(&set)
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, LayoutError::InvalidParameter { name: "min_pts", .. }));
}

#[test]
fn test_empty_region() {
    let arena = PixelArena::new();
    let classifier = classifier();
    let params = LayoutParams::default();
    let result = SuperPixelClassification::new(&arena, &classifier, &params)
        .analyze(&PixelSet::new())
        .unwrap();
    assert!(result.labels().is_empty());
    assert!(result.label_sets().is_empty());
}
