use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use super::{Pixel, PixelArena, PixelEdge};
use crate::utils::{EPSILON, dist, orientation_dist};

/// Distance between two pixels used by clustering.
///
/// Every variant is bounded below by the Euclidean center distance, so a
/// radius query on centers never misses a neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelDistance {
    #[default]
    Euclidean,
    /// Euclidean distance stretched by up to 2x for opposing orientations.
    AngleWeighted,
}

impl PixelDistance {
    pub fn distance(&self, a: &Pixel, b: &Pixel) -> f64 {
        let d = dist(a.center(), b.center());
        match self {
            Self::Euclidean => d,
            Self::AngleWeighted => {
                let delta = orientation_dist(a.orientation(), b.orientation());
                d * (1.0 + delta / FRAC_PI_2)
            }
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "euclidean" => Some(Self::Euclidean),
            "angle_weighted" | "angle" => Some(Self::AngleWeighted),
            _ => None,
        }
    }
}

/// Maps an edge to a weight in `[0, 1]` for the pairwise graph-cut term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWeight {
    /// The edge's own weight.
    #[default]
    Edge,
    /// Edge weight raised towards 1 when the endpoints' orientations differ.
    Orientation,
    /// Center distance relative to the pixels' size.
    Euclidean,
}

impl EdgeWeight {
    pub fn weight(&self, edge: &PixelEdge, arena: &PixelArena) -> f64 {
        let w = match self {
            Self::Edge => edge.weight(),
            Self::Orientation => {
                let (p, q) = (&arena[edge.first()], &arena[edge.second()]);
                let deviation = orientation_dist(p.orientation(), q.orientation());
                let agreement = 1.0 - deviation / FRAC_PI_2;
                1.0 - (1.0 - edge.weight()) * agreement
            }
            Self::Euclidean => {
                let (p, q) = (&arena[edge.first()], &arena[edge.second()]);
                let len = dist(p.center(), q.center());
                let scale = p.ellipse().major_axis() + q.ellipse().major_axis();
                if len + scale <= EPSILON {
                    0.0
                } else {
                    len / (len + scale)
                }
            }
        };
        w.clamp(0.0, 1.0)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "edge" => Some(Self::Edge),
            "orientation" => Some(Self::Orientation),
            "euclidean" => Some(Self::Euclidean),
            _ => None,
        }
    }
}
