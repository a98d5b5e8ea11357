//! Geographic primitives: coordinates, unit conversions, and the spherical
//! destination-point formula the sample rings are laid out with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in kilometers, shared by both spherical formulas below.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Rounds both axes to three decimal places (roughly 100 m of precision,
    /// coarse enough that stored points stay stable across regenerations).
    pub fn rounded(self) -> Self {
        Self {
            lat: round3(self.lat),
            lng: round3(self.lng),
        }
    }

    /// Formats the coordinate as the `"lat,lng"` string the providers expect.
    pub fn as_query(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// A destination-point computation left the domain of the spherical formula
/// (non-finite center, radius, or result).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("no finite destination from ({lat}, {lng}) at bearing {bearing}°")]
pub struct GeometryError {
    pub lat: f64,
    pub lng: f64,
    pub bearing: f64,
}

pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

pub fn radians_to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Rounds a value to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Computes the point `distance_km` away from `origin` along `bearing_deg`
/// (degrees clockwise from true north) on a spherical Earth.
///
/// Returns `None` when the result is not a finite coordinate.
pub fn destination_point(
    origin: Coordinate,
    bearing_deg: f64,
    distance_km: f64,
) -> Option<Coordinate> {
    let delta = distance_km / EARTH_RADIUS_KM;
    let bearing = degrees_to_radians(bearing_deg);

    let lat1 = degrees_to_radians(origin.lat);
    let lon1 = degrees_to_radians(origin.lng);

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 =
        lon1 + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    let dest = Coordinate::new(radians_to_degrees(lat2), radians_to_degrees(lon2));
    if dest.is_finite() { Some(dest) } else { None }
}

/// Great-circle distance between two coordinates in kilometers (haversine).
pub fn great_circle_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = degrees_to_radians(a.lat);
    let lat2 = degrees_to_radians(b.lat);
    let dlat = degrees_to_radians(b.lat - a.lat);
    let dlng = degrees_to_radians(b.lng - a.lng);

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
