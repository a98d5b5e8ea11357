pub mod distance;
pub mod geocode;
