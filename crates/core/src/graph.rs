//! PixelGraph - a pixel set together with its edges.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::connect::PixelConnector;
use crate::error::{LayoutError, Result};
use crate::pixel::{PixelArena, PixelEdge, PixelId, PixelSet};

/// Undirected graph over a [`PixelSet`].
///
/// Every edge endpoint is a member of the set. Incident edges are indexed by
/// pixel so `edges_of` is a constant-time lookup.
#[derive(Debug, Clone, Default)]
pub struct PixelGraph {
    set: PixelSet,
    edges: Vec<PixelEdge>,
    pixel_edges: FxHashMap<PixelId, SmallVec<[usize; 8]>>,
}

impl PixelGraph {
    /// Graph without edges.
    pub fn new(set: PixelSet) -> Self {
        Self {
            set,
            edges: Vec::new(),
            pixel_edges: FxHashMap::default(),
        }
    }

    /// Connects `set` with `connector`.
    pub fn build(
        arena: &PixelArena,
        set: PixelSet,
        connector: &dyn PixelConnector,
    ) -> Result<Self> {
        let edges = connector.connect(arena, &set)?;
        debug!(
            connector = connector.name(),
            pixels = set.len(),
            edges = edges.len(),
            "pixel graph"
        );
        Self::from_edges(set, edges)
    }

    /// Wraps an explicit edge list; fails if an edge leaves the set.
    pub fn from_edges(set: PixelSet, edges: Vec<PixelEdge>) -> Result<Self> {
        let mut pixel_edges: FxHashMap<PixelId, SmallVec<[usize; 8]>> = FxHashMap::default();
        for (idx, edge) in edges.iter().enumerate() {
            for pixel in [edge.first(), edge.second()] {
                if !set.contains(pixel) {
                    return Err(LayoutError::DanglingEdge { edge: idx, pixel });
                }
            }
            pixel_edges.entry(edge.first()).or_default().push(idx);
            if !edge.is_loop() {
                pixel_edges.entry(edge.second()).or_default().push(idx);
            }
        }
        Ok(Self {
            set,
            edges,
            pixel_edges,
        })
    }

    /// Replaces the edges with those of `connector`.
    pub fn connect(&mut self, arena: &PixelArena, connector: &dyn PixelConnector) -> Result<()> {
        *self = Self::build(arena, self.set.clone(), connector)?;
        Ok(())
    }

    pub fn set(&self) -> &PixelSet {
        &self.set
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[PixelEdge] {
        &self.edges
    }

    pub fn edge(&self, idx: usize) -> Option<&PixelEdge> {
        self.edges.get(idx)
    }

    /// Indices of the edges incident to `id`.
    pub fn edge_indexes(&self, id: PixelId) -> &[usize] {
        self.pixel_edges.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Edges incident to `id`.
    pub fn edges_of(&self, id: PixelId) -> impl Iterator<Item = &PixelEdge> + '_ {
        self.edge_indexes(id).iter().map(|&i| &self.edges[i])
    }

    /// The node → incident edge indices map.
    pub fn edge_index_map(&self) -> &FxHashMap<PixelId, SmallVec<[usize; 8]>> {
        &self.pixel_edges
    }

    pub fn neighbors(&self, id: PixelId) -> impl Iterator<Item = PixelId> + '_ {
        self.edges_of(id).filter_map(move |e| e.other(id))
    }

    pub fn degree(&self, id: PixelId) -> usize {
        self.edge_indexes(id).len()
    }

    pub fn is_isolated(&self, id: PixelId) -> bool {
        self.edge_indexes(id).is_empty()
    }

    /// Members without any incident edge, in set order.
    pub fn isolated(&self) -> Vec<PixelId> {
        self.set.iter().filter(|&id| self.is_isolated(id)).collect()
    }

    /// Position of `id` in the set.
    pub fn pixel_index(&self, id: PixelId) -> Option<usize> {
        self.set.position(id)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn num_pixels(&self) -> usize {
        self.set.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Connected components restricted to edges accepted by `keep`;
    /// isolated members become singleton sets. Ordered by first member.
    pub fn components_by(&self, keep: impl Fn(&PixelEdge) -> bool) -> Vec<PixelSet> {
        let kept: Vec<PixelEdge> = self.edges.iter().filter(|e| keep(e)).copied().collect();
        let mut components = PixelSet::from_edges(&kept);
        let covered: PixelSet = components.iter().flat_map(|c| c.iter()).collect();
        components.extend(
            self.set
                .iter()
                .filter(|id| !covered.contains(*id))
                .map(|id| std::iter::once(id).collect::<PixelSet>()),
        );
        components.sort_by_key(|c| c.iter().filter_map(|id| self.set.position(id)).min());
        components
    }

    pub fn components(&self) -> Vec<PixelSet> {
        self.components_by(|_| true)
    }
}
