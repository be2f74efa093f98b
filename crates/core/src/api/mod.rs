//! High-level API for labeling pixel sets.
//!
//! # Example
//!
//! ```ignore
//! use superpix_core::api::SuperPixelClassification;
//!
//! let classifier = SuperPixelClassifier::from_json(&model_json)?;
//! let params = LayoutParams::from_options([("connector", "region")])?;
//! let result = SuperPixelClassification::new(&arena, &classifier, &params).analyze(&arena.all())?;
//! result.apply(&mut arena);
//! ```

pub mod pipeline;

pub use pipeline::{RegionResult, SuperPixelClassification};
