//! Tests for alpha-expansion refinement.

use superpix_core::classify::Prediction;
use superpix_core::error::LayoutError;
use superpix_core::graph::PixelGraph;
use superpix_core::graphcut::{
    AlphaExpansion, Energy, GraphCutParams, PairTerm, Smoothness, UnaryCosts, refine_labels,
    refine_text_lines,
};
use superpix_core::label::LabelInfo;
use superpix_core::pixel::{PixelArena, PixelEdge, PixelId, PixelSet, PixelStats};
use superpix_core::utils::Ellipse;

/// Deterministic pseudo-random costs.
fn lcg(seed: &mut u64) -> f64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (*seed >> 11) as f64 / (1u64 << 53) as f64
}

fn grid_energy(side: usize, num_labels: usize, weight: f64, seed: u64) -> Energy {
    let mut seed = seed;
    let rows: Vec<Vec<f64>> = (0..side * side)
        .map(|_| (0..num_labels).map(|_| 3.0 * lcg(&mut seed)).collect())
        .collect();
    let mut pairs = Vec::new();
    for r in 0..side {
        for c in 0..side {
            let i = r * side + c;
            if c + 1 < side {
                pairs.push(PairTerm { a: i, b: i + 1, weight });
            }
            if r + 1 < side {
                pairs.push(PairTerm { a: i, b: i + side, weight });
            }
        }
    }
    Energy::new(UnaryCosts::from_rows(num_labels, &rows).unwrap(), pairs, Smoothness::default())
}

fn prediction(probabilities: Vec<f64>) -> Prediction {
    let labels = [LabelInfo::background(), LabelInfo::text()];
    let label_index = if probabilities[1] > probabilities[0] { 1 } else { 0 };
    Prediction {
        label: labels[label_index].clone(),
        label_index,
        confidence: probabilities[label_index],
        probabilities,
    }
}

fn chain(n: usize) -> (PixelArena, PixelGraph) {
    let mut arena = PixelArena::new();
    for i in 0..n {
        let x = i as f64 * 4.0;
        arena.push(Ellipse::new((x, 0.0), (1.0, 1.0), 0.0), (x - 1.0, -1.0, x + 1.0, 1.0));
    }
    let edges = (1..n)
        .map(|i| PixelEdge::with_weight(PixelId(i - 1), PixelId(i), 0.0))
        .collect();
    let graph = PixelGraph::from_edges(arena.all(), edges).unwrap();
    (arena, graph)
}

#[test]
fn test_energy_never_increases() {
    for seed in [1, 7, 42] {
        let energy = grid_energy(5, 3, 0.8, seed);
        let initial = energy.unary.argmin();
        let result = AlphaExpansion::new(10).minimize(&energy, initial).unwrap();

        assert!(result.energy <= result.initial_energy + 1e-9);
        assert!(result.energy_trace.windows(2).all(|w| w[1] <= w[0] + 1e-9));
        assert!((energy.evaluate(&result.labels) - result.energy).abs() < 1e-9);
        assert!(result.labels.iter().all(|&l| l < 3));
    }
}

#[test]
fn test_binary_result_within_potts_bound() {
    let energy = grid_energy(3, 2, 1.5, 3);
    let n = energy.num_nodes();
    let optimum = (0..1u32 << n)
        .map(|mask| {
            let labels: Vec<usize> = (0..n).map(|i| ((mask >> i) & 1) as usize).collect();
            energy.evaluate(&labels)
        })
        .fold(f64::INFINITY, f64::min);

    let result = AlphaExpansion::new(20).minimize(&energy, vec![0; n]).unwrap();
    assert!(result.converged);
    assert!(result.energy >= optimum - 1e-9);
    assert!(result.energy <= 2.0 * optimum + 1e-9);
}

#[test]
fn test_zero_sweeps_keeps_classifier_labels() {
    let (arena, graph) = chain(3);
    let predictions = vec![
        prediction(vec![0.9, 0.1]),
        prediction(vec![0.45, 0.55]),
        prediction(vec![0.9, 0.1]),
    ];
    let params = GraphCutParams {
        max_sweeps: 0,
        ..Default::default()
    };
    let result = refine_labels(&graph, &arena, &predictions, &params).unwrap();
    assert_eq!(result.labels, vec![0, 1, 0]);
    assert_eq!(result.sweeps, 0);

    // with smoothing the weak middle vote follows its neighbours
    let result = refine_labels(&graph, &arena, &predictions, &GraphCutParams::default()).unwrap();
    assert_eq!(result.labels, vec![0, 0, 0]);
    assert!(result.energy < result.initial_energy);
}

#[test]
fn test_isolated_pixel_keeps_its_best_label() {
    let mut arena = PixelArena::new();
    for i in 0..4 {
        let x = i as f64 * 4.0;
        arena.push(Ellipse::new((x, 0.0), (1.0, 1.0), 0.0), (x - 1.0, -1.0, x + 1.0, 1.0));
    }
    // pixel 3 has no edges; its neighbours-to-be all prefer label 1
    let edges = vec![
        PixelEdge::with_weight(PixelId(0), PixelId(1), 0.0),
        PixelEdge::with_weight(PixelId(1), PixelId(2), 0.0),
    ];
    let graph = PixelGraph::from_edges(arena.all(), edges).unwrap();
    let predictions = vec![
        prediction(vec![0.05, 0.95]),
        prediction(vec![0.05, 0.95]),
        prediction(vec![0.05, 0.95]),
        prediction(vec![0.9, 0.1]),
    ];
    let result = refine_labels(&graph, &arena, &predictions, &GraphCutParams::default()).unwrap();
    assert_eq!(result.labels, vec![1, 1, 1, 0]);
}

#[test]
fn test_non_metric_smoothness_fails_before_optimizing() {
    let unary = UnaryCosts::from_rows(3, &[[0.0, 1.0, 1.0], [1.0, 0.0, 1.0]]).unwrap();
    let costs = vec![vec![0.0, 1.0, 5.0], vec![1.0, 0.0, 1.0], vec![5.0, 1.0, 0.0]];
    let energy = Energy::new(
        unary,
        vec![PairTerm { a: 0, b: 1, weight: 1.0 }],
        Smoothness::Matrix { costs },
    );
    let err = AlphaExpansion::default().minimize(&energy, vec![0, 1]).unwrap_err();
    assert!(matches!(err, LayoutError::NonSubmodular { .. }));
}

#[test]
fn test_prediction_count_must_match_graph() {
    let (arena, graph) = chain(3);
    let predictions = [prediction(vec![0.5, 0.5])];
    let err = refine_labels(&graph, &arena, &predictions, &GraphCutParams::default()).unwrap_err();
    assert!(matches!(err, LayoutError::LabelCountMismatch { expected: 3, got: 1 }));
}

#[test]
fn test_time_budget_of_zero_stops_immediately() {
    let energy = grid_energy(4, 3, 1.0, 9);
    let initial = vec![0; energy.num_nodes()];
    let result = AlphaExpansion::new(5)
        .with_time_budget(std::time::Duration::ZERO)
        .minimize(&energy, initial.clone())
        .unwrap();
    assert!(result.timed_out);
    assert_eq!(result.labels, initial);
}

fn word(arena: &mut PixelArena, x: f64, y: f64) -> PixelId {
    let bbox = (x - 5.0, y - 2.0, x + 5.0, y + 2.0);
    let id = arena.push(Ellipse::new((x, y), (5.0, 2.0), 0.0), bbox);
    arena.set_stats(id, PixelStats::new(0.0, 20.0));
    id
}

#[test]
fn test_text_lines_take_back_a_misassigned_word() {
    let mut arena = PixelArena::new();
    let top: PixelSet = (0..5).map(|i| word(&mut arena, i as f64 * 14.0, 0.0)).collect();
    let mut bottom: PixelSet = (0..5).map(|i| word(&mut arena, i as f64 * 14.0, 20.0)).collect();
    // sits on the top line but was grouped with the bottom one
    let stray = word(&mut arena, 28.0, 1.0);
    bottom.add(stray);

    let lines = [top.clone(), bottom];
    let lines = refine_text_lines(&arena, &lines, &GraphCutParams::default()).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].len(), 6);
    assert!(lines[0].contains(stray));
    assert!(top.iter().all(|id| lines[0].contains(id)));
    assert_eq!(lines[1].len(), 5);
    assert!(!lines[1].contains(stray));
}

#[test]
fn test_text_lines_trivial_inputs() {
    let mut arena = PixelArena::new();
    let line: PixelSet = (0..3).map(|i| word(&mut arena, i as f64 * 14.0, 0.0)).collect();
    let params = GraphCutParams::default();

    assert!(refine_text_lines(&arena, &[], &params).unwrap().is_empty());
    let single = refine_text_lines(&arena, &[PixelSet::new(), line.clone()], &params).unwrap();
    assert_eq!(single, vec![line.clone()]);

    let unknown: PixelSet = std::iter::once(PixelId(40)).collect();
    assert!(matches!(
        refine_text_lines(&arena, &[line, unknown], &params),
        Err(LayoutError::UnknownPixel(PixelId(40)))
    ));
}
