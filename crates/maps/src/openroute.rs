use paro_core::Coordinate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{parse_json, whole_meters, MapsError};

pub const PROVIDER: &str = "openrouteservice";

/// Client for the OpenRouteService directions API, pedestrian profile.
#[derive(Clone)]
pub struct OpenRouteClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl OpenRouteClient {
    pub fn new(api_key: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Returns the length of the foot-walking route in whole meters.
    pub async fn walking_distance(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<u32, MapsError> {
        let url = self.base_url.join("v2/directions/foot-walking")?;
        // ORS expects [lon, lat] pairs.
        let body = json!({
            "coordinates": [
                [origin.lon, origin.lat],
                [destination.lon, destination.lat],
            ]
        });

        let response = self
            .http
            .post(url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let directions: DirectionsResponse = parse_json(response).await?;

        let route = directions
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| MapsError::NoRoute("no routes returned".to_string()))?;
        whole_meters(route.summary.distance)
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    summary: Summary,
}

// ORS omits `distance` for zero-length routes.
#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
}
