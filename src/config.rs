use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Runtime configuration read from the environment (a `.env` file is loaded
/// first when present).
pub struct Config {
    pub data_dir: PathBuf,
    pub radius_km: f64,
    maps_api_key: Option<String>,
    onwater_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "locations".to_string());
        let radius_km = match std::env::var("RADIUS_KM") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("RADIUS_KM is not a number: '{raw}'"))?,
            Err(_) => DEFAULT_RADIUS_KM,
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            radius_km,
            maps_api_key: std::env::var("MAPS_API_KEY").ok(),
            onwater_api_key: std::env::var("ONWATER_API_KEY").ok(),
        })
    }

    /// Key for the distance matrix and geocoding APIs. Only commands that
    /// talk to those providers demand it.
    pub fn maps_api_key(&self) -> Result<&str> {
        self.maps_api_key
            .as_deref()
            .context("MAPS_API_KEY must be set")
    }

    pub fn onwater_api_key(&self) -> Result<&str> {
        self.onwater_api_key
            .as_deref()
            .context("ONWATER_API_KEY must be set")
    }
}
