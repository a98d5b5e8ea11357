//! Trait for the land/water classification provider.

use anyhow::Result;

use crate::geo::Coordinate;

/// What the classification provider says lies under a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Land,
    Water,
}

#[async_trait::async_trait]
pub trait WaterApi: Send + Sync {
    /// Classifies a single coordinate. One call per still-unknown point; a
    /// point that already carries a flag is never re-submitted.
    async fn classify(&self, coordinate: Coordinate) -> Result<Surface>;
}
