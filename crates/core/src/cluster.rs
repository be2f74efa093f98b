//! Density-based clustering (DBSCAN) over pixel centers.
//!
//! [`DbscanPixel`] is the single clustering implementation; the DBScan
//! connector only turns its clusters into edges.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connect::triangulate;
use crate::error::{LayoutError, Result};
use crate::pixel::{PixelArena, PixelDistance, PixelEdge, PixelId, PixelSet};
use crate::utils::{Plane, Point, Rect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanParams {
    /// Absolute neighbourhood radius; derived from line spacing when unset.
    pub epsilon: Option<f64>,
    /// Radius relative to the set's median line spacing.
    pub eps_multiplier: f64,
    /// Minimum neighbourhood size, the point itself included.
    pub min_pts: usize,
    /// Upper bound on neighbour pairs visited in one run.
    pub max_neighbor_pairs: usize,
    pub distance: PixelDistance,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            epsilon: None,
            eps_multiplier: 2.0,
            min_pts: 3,
            max_neighbor_pairs: 2_000_000,
            distance: PixelDistance::Euclidean,
        }
    }
}

/// Cluster assignment of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterLabel {
    Noise,
    Cluster(usize),
}

impl ClusterLabel {
    pub fn cluster(&self) -> Option<usize> {
        match self {
            Self::Noise => None,
            Self::Cluster(c) => Some(*c),
        }
    }

    pub fn is_noise(&self) -> bool {
        matches!(self, Self::Noise)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Unvisited,
    Noise,
    Member(usize),
}

/// Result of one clustering run; labels are indexed by set position.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    labels: Vec<ClusterLabel>,
    num_clusters: usize,
    epsilon: f64,
}

impl Clustering {
    pub fn labels(&self) -> &[ClusterLabel] {
        &self.labels
    }

    pub fn label(&self, position: usize) -> Option<ClusterLabel> {
        self.labels.get(position).copied()
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_noise()).count()
    }

    /// Radius the run used.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// One set per cluster, members in set order.
    pub fn sets(&self, set: &PixelSet) -> Vec<PixelSet> {
        let mut sets = vec![PixelSet::new(); self.num_clusters];
        for (pos, id) in set.iter().enumerate() {
            if let Some(ClusterLabel::Cluster(c)) = self.labels.get(pos) {
                sets[*c].add(id);
            }
        }
        sets
    }

    pub fn noise(&self, set: &PixelSet) -> Vec<PixelId> {
        set.iter()
            .zip(&self.labels)
            .filter(|(_, l)| l.is_noise())
            .map(|(id, _)| id)
            .collect()
    }

    /// Delaunay edges within each cluster; noise pixels get none.
    pub fn edges(&self, arena: &PixelArena, set: &PixelSet) -> Vec<PixelEdge> {
        let mut edges = Vec::new();
        for cluster in self.sets(set) {
            let ids = cluster.to_vec();
            let centers: Vec<Point> = ids.iter().map(|&id| arena[id].center()).collect();
            edges.extend(
                triangulate(&centers)
                    .into_iter()
                    .map(|(i, j)| PixelEdge::new(arena, ids[i], ids[j])),
            );
        }
        edges
    }
}

/// DBSCAN over the members of a pixel set.
pub struct DbscanPixel<'a> {
    arena: &'a PixelArena,
    set: &'a PixelSet,
    params: DbscanParams,
}

impl<'a> DbscanPixel<'a> {
    pub fn new(arena: &'a PixelArena, set: &'a PixelSet, params: DbscanParams) -> Self {
        Self { arena, set, params }
    }

    /// Radius for this set: the configured epsilon, or the median line
    /// spacing times the multiplier.
    pub fn epsilon(&self) -> f64 {
        if let Some(eps) = self.params.epsilon {
            return eps;
        }
        let spacing = self.set.line_spacing(self.arena, 0.5).unwrap_or_else(|| {
            let spacings: Vec<f64> =
                self.set.iter().map(|id| self.arena[id].line_spacing()).collect();
            crate::utils::stat_moment(&spacings, 0.5)
        });
        spacing * self.params.eps_multiplier
    }

    pub fn compute(&self) -> Result<Clustering> {
        self.arena.check_set(self.set)?;
        let ids = self.set.to_vec();
        let n = ids.len();
        let epsilon = self.epsilon();
        let min_pts = self.params.min_pts.max(1);

        if n == 0 || !(epsilon.is_finite() && epsilon > 0.0) {
            debug!(pixels = n, epsilon, "nothing to cluster");
            return Ok(Clustering {
                labels: vec![ClusterLabel::Noise; n],
                num_clusters: 0,
                epsilon,
            });
        }

        let centers: Vec<Rect> = ids
            .iter()
            .map(|&id| {
                let (x, y) = self.arena[id].center();
                (x, y, x, y)
            })
            .collect();
        let plane = Plane::from_items(centers);

        let mut pairs = 0usize;
        let mut region_query = |pos: usize| -> Result<Vec<usize>> {
            let px = &self.arena[ids[pos]];
            let neighbours: Vec<usize> = plane
                .within_radius(px.center(), epsilon)
                .into_iter()
                .filter(|&q| self.params.distance.distance(px, &self.arena[ids[q]]) <= epsilon)
                .collect();
            pairs += neighbours.len();
            if pairs > self.params.max_neighbor_pairs {
                return Err(LayoutError::TooManyEdges {
                    limit: self.params.max_neighbor_pairs,
                    pixel: ids[pos],
                });
            }
            Ok(neighbours)
        };

        let mut state = vec![State::Unvisited; n];
        let mut num_clusters = 0;
        let mut queue = VecDeque::new();

        for p in 0..n {
            if state[p] != State::Unvisited {
                continue;
            }
            let neighbours = region_query(p)?;
            if neighbours.len() < min_pts {
                state[p] = State::Noise;
                continue;
            }

            let cluster = num_clusters;
            num_clusters += 1;
            state[p] = State::Member(cluster);
            queue.clear();
            queue.extend(neighbours);

            while let Some(q) = queue.pop_front() {
                match state[q] {
                    State::Noise => state[q] = State::Member(cluster),
                    State::Unvisited => {
                        state[q] = State::Member(cluster);
                        let expansion = region_query(q)?;
                        if expansion.len() >= min_pts {
                            queue.extend(expansion.into_iter().filter(|&r| {
                                matches!(state[r], State::Unvisited | State::Noise)
                            }));
                        }
                    }
                    State::Member(_) => {}
                }
            }
        }

        let labels: Vec<ClusterLabel> = state
            .into_iter()
            .map(|s| match s {
                State::Member(c) => ClusterLabel::Cluster(c),
                _ => ClusterLabel::Noise,
            })
            .collect();
        let clustering = Clustering {
            labels,
            num_clusters,
            epsilon,
        };
        debug!(
            pixels = n,
            epsilon,
            clusters = num_clusters,
            noise = clustering.noise_count(),
            neighbor_pairs = pairs,
            "dbscan"
        );
        Ok(clustering)
    }
}
