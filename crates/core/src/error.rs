//! Error types for the superpix labeling engine.

use thiserror::Error;

use crate::pixel::PixelId;

/// Primary error type for graph construction, classification and refinement.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("feature dimension mismatch{}: model expects {expected}, got {got}", fmt_pixel(.pixel))]
    DimensionMismatch {
        expected: usize,
        got: usize,
        pixel: Option<PixelId>,
    },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("unsupported model format version {found} (expected {expected})")]
    UnsupportedModelVersion { found: u32, expected: u32 },

    #[error("unknown label id: {0}")]
    UnknownLabel(u32),

    #[error("smoothness term is not a metric for labels ({a}, {b}, {c}): {reason}")]
    NonSubmodular {
        a: usize,
        b: usize,
        c: usize,
        reason: &'static str,
    },

    #[error("label count mismatch: expected {expected}, got {got}")]
    LabelCountMismatch { expected: usize, got: usize },

    #[error("clustering exceeded {limit} neighbor pairs at pixel {pixel}")]
    TooManyEdges { limit: usize, pixel: PixelId },

    #[error("pixel {0} is not part of the set")]
    UnknownPixel(PixelId),

    #[error("edge {edge} references pixel {pixel} outside of the set")]
    DanglingEdge { edge: usize, pixel: PixelId },

    #[error("invalid value {value:?} for parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("thread pool error: {0}")]
    ThreadPool(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_pixel(pixel: &Option<PixelId>) -> String {
    match pixel {
        Some(id) => format!(" at pixel {id}"),
        None => String::new(),
    }
}

/// Convenience Result type alias for LayoutError.
pub type Result<T> = std::result::Result<T, LayoutError>;
