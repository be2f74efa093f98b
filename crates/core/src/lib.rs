//! superpix - pixel-graph layout analysis.
//!
//! Local image elements ("pixels") are connected into a graph, classified
//! from per-pixel features and relabeled globally with alpha-expansion
//! graph cuts.

pub mod api;
pub mod classify;
pub mod cluster;
pub mod connect;
pub mod error;
pub mod features;
pub mod graph;
pub mod graphcut;
pub mod label;
pub mod params;
pub mod pixel;
pub mod utils;

pub use api::{RegionResult, SuperPixelClassification};
pub use classify::{Classifier, Prediction, SuperPixelClassifier, SuperPixelModel};
pub use cluster::{DbscanParams, DbscanPixel};
pub use connect::{Connector, ConnectorKind, PixelConnector};
pub use error::{LayoutError, Result};
pub use graph::PixelGraph;
pub use label::{LabelInfo, LabelManager, PixelLabel};
pub use params::LayoutParams;
pub use pixel::{Pixel, PixelArena, PixelEdge, PixelId, PixelSet};
