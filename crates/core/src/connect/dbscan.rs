use tracing::debug;

use super::PixelConnector;
use crate::cluster::{DbscanParams, DbscanPixel};
use crate::error::Result;
use crate::pixel::{PixelArena, PixelEdge, PixelSet};

/// Connects members of the same DBSCAN cluster; noise pixels stay
/// unconnected.
#[derive(Debug, Clone, Default)]
pub struct DbscanConnector {
    params: DbscanParams,
}

impl DbscanConnector {
    pub fn new(params: DbscanParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DbscanParams {
        &self.params
    }
}

impl PixelConnector for DbscanConnector {
    fn name(&self) -> &'static str {
        "dbscan"
    }

    fn connect(&self, arena: &PixelArena, set: &PixelSet) -> Result<Vec<PixelEdge>> {
        let clustering = DbscanPixel::new(arena, set, self.params.clone()).compute()?;
        let edges = clustering.edges(arena, set);
        debug!(
            pixels = set.len(),
            clusters = clustering.num_clusters(),
            edges = edges.len(),
            "dbscan connector"
        );
        Ok(edges)
    }
}
