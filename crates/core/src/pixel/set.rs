use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::warn;

use super::{PixelArena, PixelEdge, PixelId};
use crate::utils::{HasBBox, Line, Point, Rect, bbox_union, fit_line, stat_moment};

/// Ordered, duplicate-free collection of pixel ids.
///
/// Iteration follows insertion order, which keeps every downstream
/// consumer (connectors, clustering, feature extraction) deterministic.
#[derive(Debug, Clone, Default)]
pub struct PixelSet {
    ids: IndexSet<PixelId, FxBuildHasher>,
}

impl PartialEq for PixelSet {
    fn eq(&self, other: &Self) -> bool {
        self.ids.len() == other.ids.len() && self.ids.iter().eq(other.ids.iter())
    }
}

impl Eq for PixelSet {}

impl FromIterator<PixelId> for PixelSet {
    fn from_iter<I: IntoIterator<Item = PixelId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

impl Extend<PixelId> for PixelSet {
    fn extend<I: IntoIterator<Item = PixelId>>(&mut self, iter: I) {
        for id in iter {
            self.add(id);
        }
    }
}

impl PixelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: IndexSet::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    /// Adds `id`; returns false if it was already a member.
    pub fn add(&mut self, id: PixelId) -> bool {
        self.ids.insert(id)
    }

    /// Removes `id` keeping the order of the remaining members.
    pub fn remove(&mut self, id: PixelId) -> bool {
        let removed = self.ids.shift_remove(&id);
        if !removed {
            warn!(pixel = %id, "cannot remove pixel that is not part of the set");
        }
        removed
    }

    pub fn contains(&self, id: PixelId) -> bool {
        self.ids.contains(&id)
    }

    /// Appends all members of `other` that are not yet part of this set.
    pub fn merge(&mut self, other: &PixelSet) {
        self.ids.extend(other.ids.iter().copied());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = PixelId> + '_ {
        self.ids.iter().copied()
    }

    /// Member at position `idx` in insertion order.
    pub fn get(&self, idx: usize) -> Option<PixelId> {
        self.ids.get_index(idx).copied()
    }

    /// Position of `id` in insertion order.
    pub fn position(&self, id: PixelId) -> Option<usize> {
        self.ids.get_index_of(&id)
    }

    pub fn to_vec(&self) -> Vec<PixelId> {
        self.ids.iter().copied().collect()
    }

    pub fn bounding_box(&self, arena: &PixelArena) -> Option<Rect> {
        self.iter()
            .map(|id| arena[id].bbox())
            .reduce(bbox_union)
    }

    /// Mean of all pixel centers.
    pub fn center(&self, arena: &PixelArena) -> Option<Point> {
        if self.is_empty() {
            return None;
        }
        let n = self.len() as f64;
        let (sx, sy) = self
            .iter()
            .map(|id| arena[id].center())
            .fold((0.0, 0.0), |acc, c| (acc.0 + c.0, acc.1 + c.1));
        Some((sx / n, sy / n))
    }

    /// Pixel centers, plus the ellipse extremes along the set's text
    /// direction rotated by `offset_angle` when one is given.
    pub fn point_set(&self, arena: &PixelArena, offset_angle: Option<f64>) -> Vec<Point> {
        match offset_angle {
            None => self.iter().map(|id| arena[id].center()).collect(),
            Some(offset) => {
                let angle = self.orientation(arena, 0.5).unwrap_or(0.0) + offset;
                let mut pts = Vec::with_capacity(self.len() * 2);
                for id in self.iter() {
                    let e = arena[id].ellipse();
                    pts.push(e.point_at(angle));
                    pts.push(e.point_at(angle + std::f64::consts::PI));
                }
                pts
            }
        }
    }

    /// Total least-squares line through the set's points.
    pub fn fit_line(&self, arena: &PixelArena, offset_angle: Option<f64>) -> Option<Line> {
        fit_line(&self.point_set(arena, offset_angle))
    }

    /// `moment` quantile of the members' text orientation; `None` if no
    /// member carries statistics.
    pub fn orientation(&self, arena: &PixelArena, moment: f64) -> Option<f64> {
        self.stat_quantile(arena, moment, |s| s.orientation)
    }

    /// `moment` quantile of the members' line spacing.
    pub fn line_spacing(&self, arena: &PixelArena, moment: f64) -> Option<f64> {
        self.stat_quantile(arena, moment, |s| s.line_spacing)
    }

    fn stat_quantile(
        &self,
        arena: &PixelArena,
        moment: f64,
        f: impl Fn(&super::PixelStats) -> f64,
    ) -> Option<f64> {
        let values: Vec<f64> = self.iter().filter_map(|id| arena[id].stats().map(&f)).collect();
        if values.is_empty() {
            return None;
        }
        if values.len() < self.len() {
            warn!(
                missing = self.len() - values.len(),
                "pixel statistics missing for some set members"
            );
        }
        Some(stat_moment(&values, moment))
    }

    /// Splits the endpoints of `edges` into connected components.
    ///
    /// Components are ordered by their first appearance in `edges`; members
    /// keep their order of appearance as well.
    pub fn from_edges(edges: &[PixelEdge]) -> Vec<PixelSet> {
        let mut index: FxHashMap<PixelId, usize> = FxHashMap::default();
        let mut nodes: Vec<PixelId> = Vec::new();
        let mut parent: Vec<usize> = Vec::new();

        let mut node = |id: PixelId, nodes: &mut Vec<PixelId>, parent: &mut Vec<usize>| {
            *index.entry(id).or_insert_with(|| {
                nodes.push(id);
                parent.push(parent.len());
                nodes.len() - 1
            })
        };

        for edge in edges {
            let a = node(edge.first(), &mut nodes, &mut parent);
            let b = node(edge.second(), &mut nodes, &mut parent);
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                // smallest index stays root
                let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
                parent[hi] = lo;
            }
        }

        let mut component_of: FxHashMap<usize, usize> = FxHashMap::default();
        let mut sets: Vec<PixelSet> = Vec::new();
        for (idx, id) in nodes.iter().enumerate() {
            let root = find(&mut parent, idx);
            let slot = *component_of.entry(root).or_insert_with(|| {
                sets.push(PixelSet::new());
                sets.len() - 1
            });
            sets[slot].add(*id);
        }
        sets
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Ellipse;

    fn arena(n: usize) -> PixelArena {
        let mut arena = PixelArena::new();
        for i in 0..n {
            let x = i as f64 * 10.0;
            arena.push(Ellipse::new((x, 0.0), (2.0, 1.0), 0.0), (x - 2.0, -1.0, x + 2.0, 1.0));
        }
        arena
    }

    #[test]
    fn test_set_keeps_insertion_order_without_duplicates() {
        let mut set: PixelSet =
            [PixelId(3), PixelId(1), PixelId(3), PixelId(2)].into_iter().collect();
        assert_eq!(set.to_vec(), vec![PixelId(3), PixelId(1), PixelId(2)]);
        assert!(set.remove(PixelId(1)));
        assert!(!set.remove(PixelId(1)));
        assert_eq!(set.to_vec(), vec![PixelId(3), PixelId(2)]);
        assert_eq!(set.position(PixelId(2)), Some(1));
    }

    #[test]
    fn test_from_edges_connected_components() {
        let edges = vec![
            PixelEdge::with_weight(PixelId(4), PixelId(5), 0.1),
            PixelEdge::with_weight(PixelId(0), PixelId(1), 0.1),
            PixelEdge::with_weight(PixelId(1), PixelId(2), 0.1),
            PixelEdge::with_weight(PixelId(5), PixelId(6), 0.1),
        ];
        let sets = PixelSet::from_edges(&edges);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].to_vec(), vec![PixelId(4), PixelId(5), PixelId(6)]);
        assert_eq!(sets[1].to_vec(), vec![PixelId(0), PixelId(1), PixelId(2)]);
    }

    #[test]
    fn test_bounding_box_and_center() {
        let arena = arena(3);
        let set = arena.all();
        assert_eq!(set.bounding_box(&arena), Some((-2.0, -1.0, 22.0, 1.0)));
        assert_eq!(set.center(&arena), Some((10.0, 0.0)));
        assert_eq!(PixelSet::new().center(&arena), None);
        assert_eq!(set.orientation(&arena, 0.5), None);
    }
}
