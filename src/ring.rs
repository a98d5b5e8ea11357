//! Sample-ring generation: a center point plus eight compass points at a
//! fixed geodesic radius, forming the endpoints later fed to the distance
//! provider.

use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, GeometryError, destination_point};

/// Name of the ring's center point.
pub const CENTER: &str = "CENTER";

/// Names of the eight outer points, in bearing order (0° to 315° in 45°
/// steps).
pub const COMPASS_NAMES: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Number of points in a complete ring.
pub const RING_SIZE: usize = 9;

/// One named sampling endpoint around a location.
///
/// `on_land` is tri-state: `None` until the land filter has classified the
/// point, then `Some(true)` or `Some(false)` for good. Only points known to
/// be on land are used as sampling endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_land: Option<bool>,
}

impl SamplePoint {
    fn new(name: &str, coordinate: Coordinate) -> Self {
        let Coordinate { lat, lng } = coordinate.rounded();
        Self {
            name: name.to_string(),
            lat,
            lng,
            on_land: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// Generates the nine sample points around `center`: "CENTER" first, then the
/// eight compass points at `radius_km` along bearings 0°, 45°, …, 315°.
///
/// Coordinates are rounded to three decimal places. The ring is
/// all-or-nothing: if any destination fails to come out finite the whole ring
/// fails, so a location always carries either zero or nine points.
pub fn generate_ring(
    center: Coordinate,
    radius_km: f64,
) -> Result<Vec<SamplePoint>, GeometryError> {
    if !center.is_finite() {
        return Err(GeometryError {
            lat: center.lat,
            lng: center.lng,
            bearing: 0.0,
        });
    }

    let mut points = Vec::with_capacity(RING_SIZE);
    points.push(SamplePoint::new(CENTER, center));

    for (index, name) in COMPASS_NAMES.iter().enumerate() {
        let bearing = index as f64 * 45.0;
        let dest = destination_point(center, bearing, radius_km).ok_or(GeometryError {
            lat: center.lat,
            lng: center.lng,
            bearing,
        })?;
        points.push(SamplePoint::new(name, dest));
    }

    Ok(points)
}
