//! Tests for density-based clustering of pixels.

use superpix_core::cluster::{ClusterLabel, DbscanParams, DbscanPixel};
use superpix_core::connect::{DbscanConnector, PixelConnector};
use superpix_core::error::LayoutError;
use superpix_core::pixel::{PixelArena, PixelDistance, PixelSet, PixelStats};
use superpix_core::utils::Ellipse;

/// Two runs of five pixels, one unit apart; the runs' nearest members are
/// `gap` units apart.
fn two_runs(arena: &mut PixelArena, gap: f64) -> PixelSet {
    let mut set = PixelSet::new();
    for start in [0.0, 4.0 + gap] {
        for i in 0..5 {
            let x = start + i as f64;
            let bbox = (x - 0.4, -0.4, x + 0.4, 0.4);
            set.add(arena.push(Ellipse::new((x, 0.0), (0.4, 0.4), 0.0), bbox));
        }
    }
    set
}

fn params(epsilon: f64, min_pts: usize) -> DbscanParams {
    DbscanParams {
        epsilon: Some(epsilon),
        min_pts,
        ..Default::default()
    }
}

#[test]
fn test_two_separated_runs_form_two_clusters() {
    let mut arena = PixelArena::new();
    let set = two_runs(&mut arena, 96.0);
    let clustering = DbscanPixel::new(&arena, &set, params(2.0, 3)).compute().unwrap();

    assert_eq!(clustering.num_clusters(), 2);
    assert_eq!(clustering.noise_count(), 0);
    let sets = clustering.sets(&set);
    assert_eq!(sets.len(), 2);
    assert!(sets.iter().all(|s| s.len() == 5));
    assert_eq!(clustering.label(0), clustering.label(4));
    assert_ne!(clustering.label(0), clustering.label(5));
}

#[test]
fn test_runs_fifty_units_apart() {
    let mut arena = PixelArena::new();
    let set = two_runs(&mut arena, 50.0);
    let clustering = DbscanPixel::new(&arena, &set, params(2.0, 3)).compute().unwrap();

    assert_eq!(clustering.num_clusters(), 2);
    assert_eq!(clustering.noise_count(), 0);
    assert_eq!(clustering.label(5), clustering.label(9));
    assert_ne!(clustering.label(4), clustering.label(5));
}

#[test]
fn test_raising_min_pts_never_reduces_noise() {
    let mut arena = PixelArena::new();
    let set = two_runs(&mut arena, 96.0);
    let mut previous = 0;
    for min_pts in 1..=8 {
        let noise = DbscanPixel::new(&arena, &set, params(2.0, min_pts))
            .compute()
            .unwrap()
            .noise_count();
        assert!(noise >= previous, "min_pts {min_pts}: {noise} < {previous}");
        previous = noise;
    }
    // no pixel has more than five neighbours (itself included)
    assert_eq!(previous, 10);
}

#[test]
fn test_isolated_pixel_is_noise() {
    let mut arena = PixelArena::new();
    let mut set = two_runs(&mut arena, 96.0);
    let lone = arena.push(Ellipse::new((50.0, 50.0), (0.4, 0.4), 0.0), (49.6, 49.6, 50.4, 50.4));
    set.add(lone);

    let clustering = DbscanPixel::new(&arena, &set, params(2.0, 3)).compute().unwrap();
    assert_eq!(clustering.label(10), Some(ClusterLabel::Noise));
    assert_eq!(clustering.noise(&set), vec![lone]);
}

#[test]
fn test_epsilon_from_line_spacing() {
    let mut arena = PixelArena::new();
    let set = two_runs(&mut arena, 96.0);
    for id in set.iter() {
        arena.set_stats(id, PixelStats::new(0.0, 1.5));
    }
    let dbscan = DbscanPixel::new(&arena, &set, DbscanParams::default());
    assert!((dbscan.epsilon() - 3.0).abs() < 1e-9);
    assert_eq!(dbscan.compute().unwrap().num_clusters(), 2);
}

#[test]
fn test_neighbour_cap_aborts() {
    let mut arena = PixelArena::new();
    let set = two_runs(&mut arena, 96.0);
    let capped = DbscanParams {
        max_neighbor_pairs: 5,
        ..params(2.0, 3)
    };
    let err = DbscanPixel::new(&arena, &set, capped).compute().unwrap_err();
    assert!(matches!(err, LayoutError::TooManyEdges { limit: 5, .. }));
}

#[test]
fn test_angle_weighted_distance_splits_orientations() {
    let mut arena = PixelArena::new();
    let mut set = PixelSet::new();
    // same positions, alternating orientation
    for i in 0..6 {
        let x = i as f64;
        let angle = if i < 3 { 0.0 } else { std::f64::consts::FRAC_PI_2 };
        let bbox = (x - 0.4, -0.4, x + 0.4, 0.4);
        set.add(arena.push(Ellipse::new((x, 0.0), (0.4, 0.2), angle), bbox));
    }
    let euclidean = DbscanPixel::new(&arena, &set, params(1.5, 2)).compute().unwrap();
    assert_eq!(euclidean.num_clusters(), 1);

    let weighted = DbscanParams {
        distance: PixelDistance::AngleWeighted,
        ..params(1.5, 2)
    };
    let clustering = DbscanPixel::new(&arena, &set, weighted).compute().unwrap();
    assert_eq!(clustering.num_clusters(), 2);
}

#[test]
fn test_connector_links_clusters_only() {
    let mut arena = PixelArena::new();
    let set = two_runs(&mut arena, 96.0);
    let edges = DbscanConnector::new(params(2.0, 3)).connect(&arena, &set).unwrap();
    // each collinear run of five becomes a chain
    assert_eq!(edges.len(), 8);
    for e in &edges {
        let (a, b) = (e.first().0, e.second().0);
        assert_eq!(a < 5, b < 5);
    }
}
