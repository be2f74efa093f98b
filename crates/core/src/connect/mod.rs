//! Connector strategies.
//!
//! A connector turns a [`PixelSet`] into candidate edges. Connectors never
//! mutate their input and produce the same edges, in the same order, for the
//! same set and configuration.

mod dbscan;
mod delaunay;
mod region;
mod tabstop;

use serde::{Deserialize, Serialize};

use crate::cluster::DbscanParams;
use crate::error::Result;
use crate::pixel::{PixelArena, PixelEdge, PixelSet};

pub use dbscan::DbscanConnector;
pub use delaunay::{DelaunayConnector, triangulate};
pub use region::RegionConnector;
pub use tabstop::TabStopConnector;

/// Edge-producing strategy over a pixel set.
pub trait PixelConnector: Send + Sync {
    fn name(&self) -> &'static str;

    fn connect(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<PixelEdge>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    #[default]
    Delaunay,
    Region,
    #[serde(alias = "tabstop")]
    TabStop,
    #[serde(alias = "dbscan")]
    DbScan,
}

impl ConnectorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "delaunay" => Some(Self::Delaunay),
            "region" => Some(Self::Region),
            "tabstop" | "tab_stop" => Some(Self::TabStop),
            "dbscan" | "db_scan" => Some(Self::DbScan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorParams {
    pub kind: ConnectorKind,
    /// Fixed gap threshold for the region connector.
    pub max_distance: Option<f64>,
    pub line_spacing_multiplier: f64,
    pub tab_multiplier: f64,
    /// Alignment tolerance relative to line spacing.
    pub tab_tolerance: f64,
}

impl Default for ConnectorParams {
    fn default() -> Self {
        Self {
            kind: ConnectorKind::Delaunay,
            max_distance: None,
            line_spacing_multiplier: 2.0,
            tab_multiplier: 1.0,
            tab_tolerance: 0.1,
        }
    }
}

/// Connector selected by configuration.
#[derive(Debug, Clone)]
pub enum Connector {
    Delaunay(DelaunayConnector),
    Region(RegionConnector),
    TabStop(TabStopConnector),
    DbScan(DbscanConnector),
}

impl Connector {
    pub fn from_params(params: &ConnectorParams, dbscan: &DbscanParams) -> Self {
        match params.kind {
            ConnectorKind::Delaunay => Self::Delaunay(DelaunayConnector::new()),
            ConnectorKind::Region => Self::Region(match params.max_distance {
                Some(d) => RegionConnector::with_max_distance(d),
                None => RegionConnector::new(params.line_spacing_multiplier),
            }),
            ConnectorKind::TabStop => {
                Self::TabStop(TabStopConnector::new(params.tab_multiplier, params.tab_tolerance))
            }
            ConnectorKind::DbScan => Self::DbScan(DbscanConnector::new(dbscan.clone())),
        }
    }

    fn inner(&self) -> &dyn PixelConnector {
        match self {
            Self::Delaunay(c) => c,
            Self::Region(c) => c,
            Self::TabStop(c) => c,
            Self::DbScan(c) => c,
        }
    }
}

impl PixelConnector for Connector {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn connect(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<PixelEdge>> {
        self.inner().connect(arena, set)
    }
}

impl PixelSet {
    /// Edges of this set under `connector`.
    pub fn connect(
        &self,
        arena: &PixelArena,
        connector: &dyn PixelConnector,
    ) -> Result<Vec<PixelEdge>> {
        connector.connect(arena, self)
    }
}
