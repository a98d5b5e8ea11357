use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::ring::SamplePoint;
use crate::stats::Reading;

mod json;

pub use json::JsonStore;

/// A registered location with its sampling ring and accumulated readings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub points: Vec<SamplePoint>,
    #[serde(default)]
    pub readings: Vec<Reading>,
}

impl Location {
    pub fn new(name: &str, lat: f64, lng: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lng,
            country: None,
            points: Vec::new(),
            readings: Vec::new(),
        }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// Points confirmed to be on land, the only ones worth routing between.
    pub fn usable_points(&self) -> Vec<&SamplePoint> {
        self.points
            .iter()
            .filter(|p| p.on_land == Some(true))
            .collect()
    }
}

/// Persistence for locations. Names are the document keys.
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn find(&self, name: &str) -> Result<Option<Location>>;
    async fn find_all(&self) -> Result<Vec<Location>>;
    /// Fails if a location with the same name already exists.
    async fn insert(&self, location: &Location) -> Result<()>;
    async fn set_points(&self, name: &str, points: Vec<SamplePoint>) -> Result<()>;
    async fn set_on_land(&self, name: &str, point_name: &str, on_land: bool) -> Result<()>;
    async fn set_country(&self, name: &str, country: &str) -> Result<()>;
    async fn push_reading(&self, name: &str, reading: Reading) -> Result<()>;
    /// Drops accumulated readings from every location, returning how many
    /// documents were touched.
    async fn clear_readings(&self) -> Result<usize>;
}
