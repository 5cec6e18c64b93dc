use paro_core::Coordinate;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{parse_json, MapsError};

/// Provider label used in logs and metrics.
pub const PROVIDER: &str = "google";

/// Client for the Google Geocoding and Distance Matrix APIs.
#[derive(Clone)]
pub struct GoogleMapsClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl GoogleMapsClient {
    /// Creates a client rooted at `base_url` (normally `https://maps.googleapis.com/maps/api/`).
    pub fn new(api_key: impl Into<String>, base_url: Url, http: Client) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Resolves an address to the first matching coordinate.
    ///
    /// Returns `Ok(None)` when the provider answers with no results.
    pub async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, MapsError> {
        let mut url = self.base_url.join("geocode/json")?;
        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("key", &self.api_key);

        let response = self.http.get(url).send().await?;
        let body: GeocodeResponse = parse_json(response).await?;
        body.ensure_status()?;

        Ok(body
            .results
            .into_iter()
            .next()
            .map(|result| {
                let location = result.geometry.location;
                Coordinate::new(location.lat, location.lng)
            }))
    }

    /// Returns the walking distance in meters between two points.
    pub async fn walking_distance(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<u32, MapsError> {
        let mut url = self.base_url.join("distancematrix/json")?;
        url.query_pairs_mut()
            .append_pair("origins", &origin.to_string())
            .append_pair("destinations", &destination.to_string())
            .append_pair("mode", "walking")
            .append_pair("key", &self.api_key);

        let response = self.http.get(url).send().await?;
        let body: DistanceMatrixResponse = parse_json(response).await?;
        if body.status != "OK" {
            return Err(MapsError::Provider {
                status: body.status,
                message: body.error_message.unwrap_or_default(),
            });
        }

        let element = body
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| MapsError::Malformed("distance matrix has no elements".to_string()))?;

        if element.status != "OK" {
            return Err(MapsError::NoRoute(element.status));
        }

        element
            .distance
            .map(|distance| distance.value)
            .ok_or_else(|| {
                MapsError::Malformed("distance matrix element without distance".to_string())
            })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

impl GeocodeResponse {
    fn ensure_status(&self) -> Result<(), MapsError> {
        match self.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(()),
            other => Err(MapsError::Provider {
                status: other.to_string(),
                message: self.error_message.clone().unwrap_or_default(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixRow {
    #[serde(default)]
    elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixElement {
    status: String,
    #[serde(default)]
    distance: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::StatusCode;
    use serde_json::json;

    fn client(server: &MockServer) -> GoogleMapsClient {
        let base = Url::parse(&server.url("/maps/api/")).expect("url");
        GoogleMapsClient::new("maps-key", base, Client::builder().build().expect("client"))
    }

    #[tokio::test]
    async fn geocode_returns_first_result() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/maps/api/geocode/json")
                    .query_param("address", "Calle 9 100, B, L, P, Argentina")
                    .query_param("key", "maps-key");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [
                        { "geometry": { "location": { "lat": -31.4, "lng": -64.2 } } },
                        { "geometry": { "location": { "lat": 10.0, "lng": 10.0 } } }
                    ]
                }));
            })
            .await;

        let coordinate = client(&server)
            .geocode("Calle 9 100, B, L, P, Argentina")
            .await
            .expect("geocode");
        mock.assert_async().await;

        assert_eq!(coordinate, Some(Coordinate::new(-31.4, -64.2)));
    }

    #[tokio::test]
    async fn geocode_without_results_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/maps/api/geocode/json");
                then.status(200)
                    .json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
            })
            .await;

        let coordinate = client(&server).geocode("nowhere").await.expect("geocode");
        assert_eq!(coordinate, None);
    }

    #[tokio::test]
    async fn geocode_surfaces_denied_requests() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/maps/api/geocode/json");
                then.status(200).json_body(json!({
                    "status": "REQUEST_DENIED",
                    "error_message": "The provided API key is invalid.",
                    "results": []
                }));
            })
            .await;

        let err = client(&server).geocode("x").await.expect_err("should fail");
        match err {
            MapsError::Provider { status, message } => {
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.contains("invalid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn walking_distance_reads_first_element() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/maps/api/distancematrix/json")
                    .query_param("origins", "-31.4,-64.2")
                    .query_param("destinations", "-31.41,-64.19")
                    .query_param("mode", "walking")
                    .query_param("key", "maps-key");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "rows": [{
                        "elements": [{
                            "status": "OK",
                            "distance": { "text": "1.5 km", "value": 1534 },
                            "duration": { "text": "20 mins", "value": 1200 }
                        }]
                    }]
                }));
            })
            .await;

        let meters = client(&server)
            .walking_distance(Coordinate::new(-31.4, -64.2), Coordinate::new(-31.41, -64.19))
            .await
            .expect("distance");
        mock.assert_async().await;
        assert_eq!(meters, 1534);
    }

    #[tokio::test]
    async fn walking_distance_reports_element_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/maps/api/distancematrix/json");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "rows": [{ "elements": [{ "status": "ZERO_RESULTS" }] }]
                }));
            })
            .await;

        let err = client(&server)
            .walking_distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0))
            .await
            .expect_err("no route");
        assert!(matches!(err, MapsError::NoRoute(status) if status == "ZERO_RESULTS"));
    }

    #[tokio::test]
    async fn http_errors_carry_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/maps/api/distancematrix/json");
                then.status(503).body("unavailable");
            })
            .await;

        let err = client(&server)
            .walking_distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0))
            .await
            .expect_err("should fail");
        match err {
            MapsError::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
