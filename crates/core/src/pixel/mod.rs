//! Pixel model - local image elements and the arena that owns them.
//!
//! A "pixel" here is a superpixel: a local element (typically an MSER blob)
//! summarized by an ellipse and a bounding box. Pixels live in a
//! [`PixelArena`] and are referenced everywhere else by [`PixelId`]:
//! - [`PixelSet`] - ordered, duplicate-free groups of ids
//! - [`PixelEdge`] / line edges - weighted id pairs
//! - [`PixelTabStop`] - tab-stop classification from incident edges

mod distance;
mod edge;
mod set;
mod tabstop;

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::label::PixelLabel;
use crate::utils::{Ellipse, HasBBox, Point, Rect, norm_angle, unit};

pub use distance::{EdgeWeight, PixelDistance};
pub use edge::{EdgeKind, PixelEdge};
pub use set::PixelSet;
pub use tabstop::{PixelTabStop, TabStopKind};

/// Stable arena index of a pixel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PixelId(pub usize);

impl PixelId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PixelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Local statistics cached on a pixel.
///
/// `orientation` is the local text direction in radians (0 = horizontal text),
/// `line_spacing` the estimated distance between neighbouring text lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelStats {
    pub orientation: f64,
    pub line_spacing: f64,
    #[serde(default)]
    pub density: f64,
    /// Per-orientation cost (low = likely); orientation `i` is `i * π / len`.
    #[serde(default)]
    pub orientation_costs: Vec<f64>,
}

impl PixelStats {
    pub fn new(orientation: f64, line_spacing: f64) -> Self {
        Self {
            orientation: norm_angle(orientation, std::f64::consts::PI),
            line_spacing,
            density: 0.0,
            orientation_costs: Vec::new(),
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Attaches an orientation cost histogram and picks its minimum as the
    /// current orientation.
    pub fn with_orientation_costs(mut self, costs: Vec<f64>) -> Self {
        self.orientation_costs = costs;
        if let Some(idx) = self.best_orientation_index() {
            self.set_orientation_index(idx);
        }
        self
    }

    pub fn num_orientations(&self) -> usize {
        self.orientation_costs.len()
    }

    fn best_orientation_index(&self) -> Option<usize> {
        self.orientation_costs
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
    }

    /// Index of the current orientation within the cost histogram.
    pub fn orientation_index(&self) -> Option<usize> {
        let n = self.num_orientations();
        if n == 0 {
            return None;
        }
        let step = std::f64::consts::PI / n as f64;
        Some(((self.orientation / step).round() as usize) % n)
    }

    pub fn set_orientation_index(&mut self, idx: usize) {
        let n = self.num_orientations();
        if n == 0 {
            return;
        }
        self.orientation = (idx % n) as f64 * std::f64::consts::PI / n as f64;
    }

    /// Unit vector along the text direction.
    pub fn orientation_vec(&self) -> Point {
        unit(self.orientation)
    }
}

/// A local element as delivered by the extraction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalElement {
    pub ellipse: Ellipse,
    pub bbox: Rect,
    #[serde(default)]
    pub stats: Option<PixelStats>,
}

/// A superpixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Pixel {
    id: PixelId,
    ellipse: Ellipse,
    bbox: Rect,
    stats: Option<PixelStats>,
    tab_stop: PixelTabStop,
    label: Option<PixelLabel>,
}

impl Pixel {
    pub fn id(&self) -> PixelId {
        self.id
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.ellipse.center
    }

    pub fn ellipse(&self) -> &Ellipse {
        &self.ellipse
    }

    pub fn angle(&self) -> f64 {
        self.ellipse.angle
    }

    pub fn stats(&self) -> Option<&PixelStats> {
        self.stats.as_ref()
    }

    pub fn tab_stop(&self) -> PixelTabStop {
        self.tab_stop
    }

    pub fn label(&self) -> Option<&PixelLabel> {
        self.label.as_ref()
    }

    /// Local text direction: the statistics' orientation, falling back to
    /// the ellipse's major axis.
    pub fn orientation(&self) -> f64 {
        self.stats
            .as_ref()
            .map(|s| s.orientation)
            .unwrap_or(self.ellipse.angle)
    }

    /// Line spacing from the statistics, or twice the major axis.
    pub fn line_spacing(&self) -> f64 {
        match &self.stats {
            Some(s) if s.line_spacing > 0.0 => s.line_spacing,
            _ => self.ellipse.major_axis() * 2.0,
        }
    }
}

impl HasBBox for Pixel {
    fn x0(&self) -> f64 {
        self.bbox.0
    }
    fn y0(&self) -> f64 {
        self.bbox.1
    }
    fn x1(&self) -> f64 {
        self.bbox.2
    }
    fn y1(&self) -> f64 {
        self.bbox.3
    }
}

/// Owner of all pixels of a page.
///
/// Geometry is immutable once pushed; labels, statistics and tab stops may
/// be updated through the arena.
#[derive(Debug, Clone, Default)]
pub struct PixelArena {
    pixels: Vec<Pixel>,
}

impl PixelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pixels: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, ellipse: Ellipse, bbox: Rect) -> PixelId {
        let id = PixelId(self.pixels.len());
        self.pixels.push(Pixel {
            id,
            ellipse,
            bbox,
            stats: None,
            tab_stop: PixelTabStop::default(),
            label: None,
        });
        id
    }

    pub fn push_element(&mut self, element: LocalElement) -> PixelId {
        let id = self.push(element.ellipse, element.bbox);
        self.pixels[id.0].stats = element.stats;
        id
    }

    pub fn extend_elements(
        &mut self,
        elements: impl IntoIterator<Item = LocalElement>,
    ) -> PixelSet {
        elements.into_iter().map(|e| self.push_element(e)).collect()
    }

    pub fn get(&self, id: PixelId) -> Option<&Pixel> {
        self.pixels.get(id.0)
    }

    pub fn contains(&self, id: PixelId) -> bool {
        id.0 < self.pixels.len()
    }

    /// Fails with [`LayoutError::UnknownPixel`] on the first member of `set`
    /// that is not stored here.
    pub fn check_set(&self, set: &PixelSet) -> Result<()> {
        match set.iter().find(|&id| !self.contains(id)) {
            Some(id) => Err(LayoutError::UnknownPixel(id)),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pixel> {
        self.pixels.iter()
    }

    /// A set holding every pixel of the arena in insertion order.
    pub fn all(&self) -> PixelSet {
        self.pixels.iter().map(Pixel::id).collect()
    }

    pub fn set_stats(&mut self, id: PixelId, stats: PixelStats) {
        if let Some(px) = self.pixels.get_mut(id.0) {
            px.stats = Some(stats);
        }
    }

    pub fn stats_mut(&mut self, id: PixelId) -> Option<&mut PixelStats> {
        self.pixels.get_mut(id.0).and_then(|px| px.stats.as_mut())
    }

    pub fn set_tab_stop(&mut self, id: PixelId, tab_stop: PixelTabStop) {
        if let Some(px) = self.pixels.get_mut(id.0) {
            px.tab_stop = tab_stop;
        }
    }

    pub fn set_label(&mut self, id: PixelId, label: PixelLabel) {
        if let Some(px) = self.pixels.get_mut(id.0) {
            px.label = Some(label);
        }
    }

    pub fn clear_label(&mut self, id: PixelId) {
        if let Some(px) = self.pixels.get_mut(id.0) {
            px.label = None;
        }
    }
}

impl Index<PixelId> for PixelArena {
    type Output = Pixel;

    fn index(&self, id: PixelId) -> &Pixel {
        &self.pixels[id.0]
    }
}
