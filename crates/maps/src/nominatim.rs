use paro_core::Coordinate;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{parse_json, MapsError};

pub const PROVIDER: &str = "nominatim";

/// Client for the OpenStreetMap Nominatim search endpoint.
#[derive(Clone)]
pub struct NominatimClient {
    http: Client,
    base_url: Url,
}

impl NominatimClient {
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { http, base_url }
    }

    /// Resolves an address to the first search hit.
    ///
    /// Returns `Ok(None)` when the search yields an empty array.
    pub async fn search(&self, address: &str) -> Result<Option<Coordinate>, MapsError> {
        let mut url = self.base_url.join("search")?;
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("format", "json")
            .append_pair("addressdetails", "1");

        let response = self.http.get(url).send().await?;
        let places: Vec<Place> = parse_json(response).await?;

        places.into_iter().next().map(Place::coordinate).transpose()
    }
}

// Nominatim encodes coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinate(self) -> Result<Coordinate, MapsError> {
        let lat = self
            .lat
            .parse::<f64>()
            .map_err(|_| MapsError::Malformed(format!("invalid latitude '{}'", self.lat)))?;
        let lon = self
            .lon
            .parse::<f64>()
            .map_err(|_| MapsError::Malformed(format!("invalid longitude '{}'", self.lon)))?;
        Ok(Coordinate::new(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> NominatimClient {
        let base = Url::parse(&server.url("/")).expect("url");
        NominatimClient::new(base, Client::builder().build().expect("client"))
    }

    #[tokio::test]
    async fn search_parses_string_coordinates() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search")
                    .query_param("q", "Calle 9 100, B, P, Argentina")
                    .query_param("format", "json")
                    .query_param("addressdetails", "1");
                then.status(200).json_body(json!([
                    { "place_id": 1, "lat": "-31.4067958", "lon": "-64.1940185", "display_name": "x" }
                ]));
            })
            .await;

        let coordinate = client(&server)
            .search("Calle 9 100, B, P, Argentina")
            .await
            .expect("search");
        mock.assert_async().await;
        assert_eq!(coordinate, Some(Coordinate::new(-31.4067958, -64.1940185)));
    }

    #[tokio::test]
    async fn empty_search_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(200).json_body(json!([]));
            })
            .await;

        assert_eq!(client(&server).search("nowhere").await.expect("search"), None);
    }

    #[tokio::test]
    async fn unparseable_coordinates_are_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(200)
                    .json_body(json!([{ "lat": "north", "lon": "-64.2" }]));
            })
            .await;

        let err = client(&server).search("x").await.expect_err("should fail");
        assert!(matches!(err, MapsError::Malformed(_)));
    }
}
