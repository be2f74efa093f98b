//! Per-pixel feature descriptors.
//!
//! A descriptor mixes the pixel's own shape (ellipse, box), its neighbourhood
//! in a [`PixelGraph`] and gradient statistics of the image patch under its
//! bounding box. The layout of the vector is fixed; models are trained
//! against [`FEATURE_DIM`] entries in the order below.
//!
//! | idx | feature |
//! |-----|---------|
//! | 0 | ellipse axis ratio (minor / major) |
//! | 1 | box aspect `w / (w + h)` |
//! | 2 | `ln(1 + major axis)` |
//! | 3 | graph degree |
//! | 4 | mean incident edge weight |
//! | 5 | local density |
//! | 6, 7 | `sin 2θ`, `cos 2θ` of the text orientation |
//! | 8 | mean gradient magnitude (normalized to `[0, 1]`) |
//! | 9 | structure-tensor coherence |
//! | 10, 11 | `sin 2φ`, `cos 2φ` of the dominant gradient orientation |

use image::GrayImage;
use rayon::prelude::*;

use crate::error::Result;
use crate::graph::PixelGraph;
use crate::pixel::{Pixel, PixelArena, PixelSet};
use crate::utils::{EPSILON, HasBBox};

pub const FEATURE_DIM: usize = 12;

/// Largest Sobel response on 8-bit input.
const MAX_GRADIENT: f64 = 4.0 * 255.0 * std::f64::consts::SQRT_2;

/// Everything feature extraction may look at besides the pixel itself.
#[derive(Clone, Copy)]
pub struct FeatureContext<'a> {
    pub arena: &'a PixelArena,
    pub graph: Option<&'a PixelGraph>,
    pub image: Option<&'a GrayImage>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(arena: &'a PixelArena) -> Self {
        Self {
            arena,
            graph: None,
            image: None,
        }
    }

    pub fn with_graph(mut self, graph: &'a PixelGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_image(mut self, image: &'a GrayImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Descriptor of `pixel`; always [`FEATURE_DIM`] long.
pub fn features(pixel: &Pixel, ctx: &FeatureContext<'_>) -> Vec<f64> {
    let mut f = Vec::with_capacity(FEATURE_DIM);

    let ellipse = pixel.ellipse();
    f.push(ellipse.axis_ratio());
    let (w, h) = (pixel.width().max(0.0), pixel.height().max(0.0));
    f.push(if w + h > EPSILON { w / (w + h) } else { 0.5 });
    f.push(ellipse.major_axis().ln_1p());

    let (degree, mean_weight) = match ctx.graph {
        Some(graph) => {
            let weights: Vec<f64> = graph.edges_of(pixel.id()).map(|e| e.weight()).collect();
            let mean = if weights.is_empty() {
                1.0
            } else {
                weights.iter().sum::<f64>() / weights.len() as f64
            };
            (weights.len() as f64, mean)
        }
        None => (0.0, 1.0),
    };
    f.push(degree);
    f.push(mean_weight);
    f.push(pixel.stats().map(|s| s.density).unwrap_or(0.0));

    let theta = 2.0 * pixel.orientation();
    f.push(theta.sin());
    f.push(theta.cos());

    let grad = ctx
        .image
        .map(|img| GradientStats::from_patch(img, pixel.bbox()))
        .unwrap_or_default();
    f.push(grad.magnitude);
    f.push(grad.coherence);
    f.push((2.0 * grad.orientation).sin() * grad.coherence);
    f.push((2.0 * grad.orientation).cos() * grad.coherence);

    debug_assert_eq!(f.len(), FEATURE_DIM);
    f
}

/// Descriptors for every member of `set`, in set order.
pub fn feature_matrix(set: &PixelSet, ctx: &FeatureContext<'_>) -> Result<Vec<Vec<f64>>> {
    ctx.arena.check_set(set)?;
    let ids = set.to_vec();
    Ok(ids.par_iter().map(|&id| features(&ctx.arena[id], ctx)).collect())
}

/// Sobel gradient statistics over an image patch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientStats {
    /// Mean gradient magnitude in `[0, 1]`.
    pub magnitude: f64,
    /// `((λ1 - λ2) / (λ1 + λ2))`, 0 for isotropic or flat patches.
    pub coherence: f64,
    /// Dominant gradient direction in radians.
    pub orientation: f64,
}

impl GradientStats {
    /// Statistics of the pixels inside `bbox` (clipped to the image). Patches
    /// smaller than 3x3 yield zeros.
    pub fn from_patch(img: &GrayImage, bbox: (f64, f64, f64, f64)) -> Self {
        let (iw, ih) = img.dimensions();
        if iw < 3 || ih < 3 {
            return Self::default();
        }
        let clip = |v: f64, max: u32| -> u32 {
            if v.is_nan() {
                0
            } else {
                v.clamp(0.0, (max - 1) as f64) as u32
            }
        };
        // interior only, Sobel needs a one pixel border
        let x0 = clip(bbox.0.floor(), iw).max(1);
        let y0 = clip(bbox.1.floor(), ih).max(1);
        let x1 = clip(bbox.2.ceil(), iw).min(iw - 2);
        let y1 = clip(bbox.3.ceil(), ih).min(ih - 2);
        if x1 < x0 || y1 < y0 {
            return Self::default();
        }

        let px = |x: u32, y: u32| img.get_pixel(x, y).0[0] as f64;
        let (mut jxx, mut jyy, mut jxy, mut mag) = (0.0, 0.0, 0.0, 0.0);
        let mut count = 0usize;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
                let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                    - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
                jxx += gx * gx;
                jyy += gy * gy;
                jxy += gx * gy;
                mag += gx.hypot(gy);
                count += 1;
            }
        }
        if count == 0 {
            return Self::default();
        }

        let trace = jxx + jyy;
        let coherence = if trace > EPSILON {
            ((jxx - jyy).powi(2) + 4.0 * jxy * jxy).sqrt() / trace
        } else {
            0.0
        };
        Self {
            magnitude: (mag / count as f64 / MAX_GRADIENT).clamp(0.0, 1.0),
            coherence: coherence.clamp(0.0, 1.0),
            orientation: 0.5 * (2.0 * jxy).atan2(jxx - jyy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelEdge;
    use crate::utils::Ellipse;
    use image::Luma;

    #[test]
    fn test_feature_vector_has_fixed_length() {
        let mut arena = PixelArena::new();
        let a = arena.push(Ellipse::new((5.0, 5.0), (4.0, 2.0), 0.0), (1.0, 3.0, 9.0, 7.0));
        let b = arena.push(Ellipse::new((15.0, 5.0), (4.0, 2.0), 0.0), (11.0, 3.0, 19.0, 7.0));
        let edges = vec![PixelEdge::with_weight(a, b, 0.25)];
        let graph = PixelGraph::from_edges(arena.all(), edges).unwrap();

        let ctx = FeatureContext::new(&arena).with_graph(&graph);
        let f = features(&arena[a], &ctx);
        assert_eq!(f.len(), FEATURE_DIM);
        assert_eq!(f[0], 0.5);
        assert!((f[1] - 8.0 / 12.0).abs() < 1e-12);
        assert_eq!(f[3], 1.0);
        assert_eq!(f[4], 0.25);
        assert_eq!(&f[8..], &[0.0; 4]);

        let rows = feature_matrix(&arena.all(), &ctx).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == FEATURE_DIM));
    }

    #[test]
    fn test_vertical_edge_gradient() {
        // dark left half, bright right half
        let img =
            GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([0u8]) } else { Luma([255u8]) });
        let stats = GradientStats::from_patch(&img, (5.0, 5.0, 15.0, 15.0));
        assert!(stats.magnitude > 0.0);
        assert!((stats.coherence - 1.0).abs() < 1e-9);
        // gradient points along x
        assert!(stats.orientation.abs() < 1e-9);

        let flat = GrayImage::from_pixel(20, 20, Luma([128u8]));
        assert_eq!(
            GradientStats::from_patch(&flat, (5.0, 5.0, 15.0, 15.0)),
            GradientStats::default()
        );
    }
}
