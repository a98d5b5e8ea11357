use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use traffic_track::fetch::{get_json, BasicClient, UrlParam};
use traffic_track::geo::Coordinate;
use traffic_track::services::{DistanceApi, DistanceMatrix, STATUS_OK};

/// Google Distance Matrix API adapter. Requests driving durations with
/// traffic for a departure time, in metric units.
pub struct GoogleMatrixClient {
    http: UrlParam<BasicClient>,
    base_url: String,
}

impl GoogleMatrixClient {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            http: UrlParam::new(BasicClient::new()?, "key", api_key),
            base_url: "https://maps.googleapis.com/maps/api/distancematrix/json".to_string(),
        })
    }
}

fn join_points(points: &[Coordinate]) -> String {
    points
        .iter()
        .map(Coordinate::as_query)
        .collect::<Vec<_>>()
        .join("|")
}

#[async_trait]
impl DistanceApi for GoogleMatrixClient {
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
        departure: DateTime<Utc>,
    ) -> Result<DistanceMatrix> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            [
                ("origins", join_points(origins)),
                ("destinations", join_points(destinations)),
                ("departure_time", departure.timestamp().to_string()),
                ("mode", "driving".to_string()),
                ("units", "metric".to_string()),
                ("traffic_model", "best_guess".to_string()),
            ],
        )?;

        let matrix: DistanceMatrix = get_json(&self.http, url.as_str()).await?;

        let status = matrix.status.as_deref().unwrap_or("missing");
        if status != STATUS_OK {
            bail!("distance matrix request rejected with status {status}");
        }
        Ok(matrix)
    }
}
