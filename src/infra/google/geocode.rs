use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use traffic_track::fetch::{get_json, BasicClient, UrlParam};
use traffic_track::geo::Coordinate;
use traffic_track::services::GeocodeApi;

/// Google Geocoding API adapter, used only for reverse lookups of the
/// country a coordinate sits in.
pub struct GoogleGeocodeClient {
    http: UrlParam<BasicClient>,
    base_url: String,
}

impl GoogleGeocodeClient {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            http: UrlParam::new(BasicClient::new()?, "key", api_key),
            base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
        })
    }
}

/// Pulls the country's long name out of the first result that carries one.
fn extract_country(payload: &Value) -> Option<String> {
    payload["results"].as_array()?.iter().find_map(|result| {
        result["address_components"]
            .as_array()?
            .iter()
            .find(|component| {
                component["types"]
                    .as_array()
                    .is_some_and(|types| types.iter().any(|t| t == "country"))
            })
            .and_then(|component| component["long_name"].as_str())
            .map(|name| name.to_string())
    })
}

#[async_trait]
impl GeocodeApi for GoogleGeocodeClient {
    async fn country(&self, coordinate: Coordinate) -> Result<Option<String>> {
        let url =
            reqwest::Url::parse_with_params(&self.base_url, [("latlng", coordinate.as_query())])?;

        let payload: Value = get_json(&self.http, url.as_str()).await?;
        Ok(extract_country(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_country_from_components() {
        let payload = json!({
            "status": "OK",
            "results": [{
                "address_components": [
                    {"long_name": "Dublin", "short_name": "Dublin", "types": ["locality", "political"]},
                    {"long_name": "Ireland", "short_name": "IE", "types": ["country", "political"]}
                ]
            }]
        });
        assert_eq!(extract_country(&payload).as_deref(), Some("Ireland"));
    }

    #[test]
    fn test_extract_country_empty_results() {
        let payload = json!({"status": "ZERO_RESULTS", "results": []});
        assert_eq!(extract_country(&payload), None);
    }

    #[test]
    fn test_extract_country_skips_results_without_components() {
        let payload = json!({
            "results": [
                {"formatted_address": "North Atlantic Ocean"},
                {"address_components": [
                    {"long_name": "Portugal", "types": ["country", "political"]}
                ]}
            ]
        });
        assert_eq!(extract_country(&payload).as_deref(), Some("Portugal"));
    }
}
