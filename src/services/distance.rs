//! Trait and wire types for the travel time/distance matrix provider.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Element status marking a usable cell.
pub const STATUS_OK: &str = "OK";

/// A numeric `value` (meters or seconds) plus the provider's display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(default)]
    pub text: String,
    pub value: f64,
}

/// One origin-to-destination cell of the matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_traffic: Option<Quantity>,
}

impl MatrixElement {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Traffic-aware travel time in seconds, falling back to the free-flow
    /// duration when the provider omitted the traffic estimate.
    pub fn travel_time(&self) -> Option<f64> {
        self.duration_in_traffic
            .as_ref()
            .or(self.duration.as_ref())
            .map(|q| q.value)
    }

    /// Trip distance in meters, if the provider supplied one.
    pub fn distance_value(&self) -> Option<f64> {
        self.distance.as_ref().map(|q| q.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

/// A pairwise duration/distance matrix in the provider's JSON shape.
///
/// `rows[i].elements[j]` is the trip from `origin_addresses[i]` to
/// `destination_addresses[j]`. The whole payload is kept verbatim on each
/// reading so summaries can be audited and re-derived later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    #[serde(default)]
    pub origin_addresses: Vec<String>,
    #[serde(default)]
    pub destination_addresses: Vec<String>,
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Abstraction over the distance-matrix provider.
#[async_trait::async_trait]
pub trait DistanceApi: Send + Sync {
    /// Fetches a fresh pairwise matrix for the given endpoints and departure
    /// time.
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        departure: DateTime<Utc>,
    ) -> Result<DistanceMatrix>;
}
