use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use traffic_track::fetch::{get_json, BasicClient, UrlParam};
use traffic_track::geo::Coordinate;
use traffic_track::services::{Surface, WaterApi};

/// OnWater API adapter telling land from open water.
pub struct OnWaterClient {
    http: UrlParam<BasicClient>,
    base_url: String,
}

impl OnWaterClient {
    pub fn new(access_token: String) -> Result<Self> {
        Ok(Self {
            http: UrlParam::new(BasicClient::new()?, "access_token", access_token),
            base_url: "https://api.onwater.io/api/v1/results".to_string(),
        })
    }
}

#[derive(Deserialize)]
struct OnWaterResponse {
    water: bool,
}

#[async_trait]
impl WaterApi for OnWaterClient {
    async fn classify(&self, coordinate: Coordinate) -> Result<Surface> {
        let url = format!("{}/{}", self.base_url, coordinate.as_query());
        let resp: OnWaterResponse = get_json(&self.http, &url).await?;
        Ok(if resp.water {
            Surface::Water
        } else {
            Surface::Land
        })
    }
}
