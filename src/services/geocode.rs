//! Trait for the reverse-geocoding provider.

use anyhow::Result;

use crate::geo::Coordinate;

#[async_trait::async_trait]
pub trait GeocodeApi: Send + Sync {
    /// Returns the country name for a coordinate, if the provider knows one.
    async fn country(&self, coordinate: Coordinate) -> Result<Option<String>>;
}
