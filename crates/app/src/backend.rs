use metrics::counter;
use paro_core::Coordinate;
use paro_maps::{
    build_http_client, google, nominatim, openroute, GoogleMapsClient, MapsError, NominatimClient,
    OpenRouteClient,
};
use paro_util::{AppConfig, MapsConfig};

/// The geocoder and routing provider pair used by a batch.
#[derive(Clone)]
pub enum MapsBackend {
    Google(GoogleMapsClient),
    Osm {
        geocoder: NominatimClient,
        router: OpenRouteClient,
    },
}

impl MapsBackend {
    pub fn from_config(config: &AppConfig) -> Result<Self, MapsError> {
        let http = build_http_client(config.http_timeout)?;
        Ok(match &config.maps {
            MapsConfig::Google { api_key, base_url } => {
                Self::Google(GoogleMapsClient::new(api_key.clone(), base_url.clone(), http))
            }
            MapsConfig::Osm {
                nominatim_base_url,
                ors_api_key,
                ors_base_url,
            } => Self::Osm {
                geocoder: NominatimClient::new(nominatim_base_url.clone(), http.clone()),
                router: OpenRouteClient::new(ors_api_key.clone(), ors_base_url.clone(), http),
            },
        })
    }

    pub fn geocoder_label(&self) -> &'static str {
        match self {
            Self::Google(_) => google::PROVIDER,
            Self::Osm { .. } => nominatim::PROVIDER,
        }
    }

    pub fn router_label(&self) -> &'static str {
        match self {
            Self::Google(_) => google::PROVIDER,
            Self::Osm { .. } => openroute::PROVIDER,
        }
    }

    /// Resolves an address; `Ok(None)` means the provider found nothing.
    pub async fn geocode(&self, address: &str) -> Result<Option<Coordinate>, MapsError> {
        let result = match self {
            Self::Google(client) => client.geocode(address).await,
            Self::Osm { geocoder, .. } => geocoder.search(address).await,
        };
        let outcome = match &result {
            Ok(Some(_)) => "hit",
            Ok(None) => "miss",
            Err(_) => "error",
        };
        counter!(
            "geocode_requests_total",
            "provider" => self.geocoder_label(),
            "result" => outcome
        )
        .increment(1);
        result
    }

    /// Walking distance in whole meters.
    pub async fn walking_distance(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<u32, MapsError> {
        let result = match self {
            Self::Google(client) => client.walking_distance(origin, destination).await,
            Self::Osm { router, .. } => router.walking_distance(origin, destination).await,
        };
        let outcome = match &result {
            Ok(_) => "ok",
            Err(MapsError::NoRoute(_)) => "no_route",
            Err(_) => "error",
        };
        counter!(
            "distance_requests_total",
            "provider" => self.router_label(),
            "result" => outcome
        )
        .increment(1);
        result
    }
}
