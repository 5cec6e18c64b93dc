pub mod google;
pub mod nominatim;
pub mod openroute;

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use google::GoogleMapsClient;
pub use nominatim::NominatimClient;
pub use openroute::OpenRouteClient;

const USER_AGENT: &str = concat!("paro-distancias/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by all provider clients.
pub fn build_http_client(timeout: Duration) -> Result<Client, MapsError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// Errors produced by the mapping provider clients.
#[derive(Debug, Error)]
pub enum MapsError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("provider rejected request with status {status}: {message}")]
    Provider { status: String, message: String },
    #[error("no walking route available: {0}")]
    NoRoute(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

pub(crate) async fn parse_json<T>(response: Response) -> Result<T, MapsError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(MapsError::Status { status, body });
    }

    Ok(response.json().await?)
}

/// Converts a provider distance in meters to whole meters.
pub(crate) fn whole_meters(value: f64) -> Result<u32, MapsError> {
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(MapsError::Malformed(format!("invalid distance {value}")));
    }
    Ok(value.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_meters_rounds_to_nearest() {
        assert_eq!(whole_meters(1234.4).unwrap(), 1234);
        assert_eq!(whole_meters(1234.5).unwrap(), 1235);
        assert_eq!(whole_meters(0.0).unwrap(), 0);
    }

    #[test]
    fn whole_meters_rejects_negative_and_nan() {
        assert!(matches!(whole_meters(-1.0), Err(MapsError::Malformed(_))));
        assert!(matches!(whole_meters(f64::NAN), Err(MapsError::Malformed(_))));
    }
}
