//! Provider abstractions driven by the sampler.
//!
//! [`DistanceApi`] yields pairwise duration/distance matrices, [`WaterApi`]
//! classifies coordinates as land or water, and [`GeocodeApi`] resolves a
//! coordinate to a country. The concrete HTTP clients live in the binary
//! crate's `infra` module.

pub mod distance;
pub mod geocode;
pub mod water;

pub use distance::{DistanceApi, DistanceMatrix, MatrixElement, MatrixRow, Quantity, STATUS_OK};
pub use geocode::GeocodeApi;
pub use water::{Surface, WaterApi};
