use std::{collections::HashMap, env, fmt, net::SocketAddr, path::PathBuf, time::Duration};

use paro_core::{Coordinate, ReferencePoints};
use url::Url;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://paro.db?mode=rwc";
pub const DEFAULT_INPUT_PATH: &str = "DOMICILIOS.xlsx";
pub const DEFAULT_REVIEW_PATH: &str = "DomiciliosParaRevisar.csv";
pub const DEFAULT_ERROR_LOG_PATH: &str = "errors.log";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://maps.googleapis.com/maps/api/";
pub const DEFAULT_NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org/";
pub const DEFAULT_ORS_BASE_URL: &str = "https://api.openrouteservice.org/";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 20 * 1024 * 1024;
/// Nominatim's usage policy allows roughly one request per second.
const OSM_DEFAULT_PACE_MS: u64 = 2000;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Which pair of geocoder and routing provider a batch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapsProvider {
    /// Google Geocoding + Distance Matrix.
    Google,
    /// Nominatim + OpenRouteService.
    Osm,
}

impl MapsProvider {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "google" => Ok(Self::Google),
            "osm" | "openstreetmap" => Ok(Self::Osm),
            other => Err(ConfigError::invalid(
                "MAPS_PROVIDER",
                other,
                "expected 'google' or 'osm'",
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Osm => "osm",
        }
    }
}

/// Provider credentials and endpoints for the selected variant.
#[derive(Debug, Clone, PartialEq)]
pub enum MapsConfig {
    Google {
        api_key: String,
        base_url: Url,
    },
    Osm {
        nominatim_base_url: Url,
        ors_api_key: String,
        ors_base_url: Url,
    },
}

impl MapsConfig {
    pub fn provider(&self) -> MapsProvider {
        match self {
            Self::Google { .. } => MapsProvider::Google,
            Self::Osm { .. } => MapsProvider::Osm,
        }
    }
}

/// Where the batch reads its employees from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeSourceConfig {
    Spreadsheet { path: PathBuf },
    HrDatabase { url: String },
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub maps: MapsConfig,
    pub reference_points: ReferencePoints,
    pub source: EmployeeSourceConfig,
    /// Target of `POST /upload`; also the spreadsheet source path.
    pub input_path: PathBuf,
    pub review_path: PathBuf,
    pub error_log_path: PathBuf,
    pub pace: Duration,
    pub http_timeout: Duration,
    pub upload_max_bytes: usize,
    /// Answer cross-origin requests from any origin.
    pub cors_enabled: bool,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Constructs the configuration from a fixed set of variables.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let environment =
            Environment::from_str(&get("APP_ENV").unwrap_or_else(|| "development".to_string()))?;
        let bind_addr = get("APP_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(ConfigError::BindAddress)?;
        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let provider =
            MapsProvider::from_str(&get("MAPS_PROVIDER").unwrap_or_else(|| "google".to_string()))?;
        let maps = match provider {
            MapsProvider::Google => MapsConfig::Google {
                api_key: required(&get, "GOOGLE_MAPS_API_KEY")?,
                base_url: url_or(&get, "GOOGLE_MAPS_BASE_URL", DEFAULT_GOOGLE_BASE_URL)?,
            },
            MapsProvider::Osm => MapsConfig::Osm {
                nominatim_base_url: url_or(&get, "NOMINATIM_BASE_URL", DEFAULT_NOMINATIM_BASE_URL)?,
                ors_api_key: required(&get, "ORS_API_KEY")?,
                ors_base_url: url_or(&get, "ORS_BASE_URL", DEFAULT_ORS_BASE_URL)?,
            },
        };

        let reference_points = ReferencePoints {
            ave: Coordinate::new(
                coordinate(&get, "COORDENADAS_AVE_LAT", 90.0)?,
                coordinate(&get, "COORDENADAS_AVE_LON", 180.0)?,
            ),
            sm: Coordinate::new(
                coordinate(&get, "COORDENADAS_SM_LAT", 90.0)?,
                coordinate(&get, "COORDENADAS_SM_LON", 180.0)?,
            ),
        };

        let input_path =
            PathBuf::from(get("INPUT_PATH").unwrap_or_else(|| DEFAULT_INPUT_PATH.to_string()));
        let source = match get("EMPLOYEE_SOURCE").as_deref().unwrap_or("spreadsheet") {
            "spreadsheet" => EmployeeSourceConfig::Spreadsheet {
                path: input_path.clone(),
            },
            "hr_database" => EmployeeSourceConfig::HrDatabase {
                url: required(&get, "HR_DATABASE_URL")?,
            },
            other => {
                return Err(ConfigError::invalid(
                    "EMPLOYEE_SOURCE",
                    other,
                    "expected 'spreadsheet' or 'hr_database'",
                ))
            }
        };

        let default_pace = match provider {
            MapsProvider::Google => 0,
            MapsProvider::Osm => OSM_DEFAULT_PACE_MS,
        };
        let pace = Duration::from_millis(number_or(&get, "PIPELINE_PACE_MS", default_pace)?);
        let http_timeout =
            Duration::from_secs(number_or(&get, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?);
        if http_timeout.is_zero() {
            return Err(ConfigError::invalid("HTTP_TIMEOUT_SECS", "0", "must be positive"));
        }
        let upload_max_bytes =
            number_or(&get, "UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES as u64)? as usize;
        let cors_enabled = bool_or(&get, "CORS_ENABLED", true)?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            maps,
            reference_points,
            source,
            input_path,
            review_path: PathBuf::from(
                get("REVIEW_PATH").unwrap_or_else(|| DEFAULT_REVIEW_PATH.to_string()),
            ),
            error_log_path: PathBuf::from(
                get("ERROR_LOG_PATH").unwrap_or_else(|| DEFAULT_ERROR_LOG_PATH.to_string()),
            ),
            pace,
            http_timeout,
            upload_max_bytes,
            cors_enabled,
        })
    }
}

fn required<G>(get: &G, name: &'static str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(name).ok_or(ConfigError::Missing(name))
}

fn url_or<G>(get: &G, name: &'static str, default: &str) -> Result<Url, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(name).unwrap_or_else(|| default.to_string());
    // A base without a trailing slash would drop its last segment on `join`.
    let normalized = if raw.ends_with('/') { raw } else { format!("{raw}/") };
    Url::parse(&normalized).map_err(|err| ConfigError::invalid(name, &normalized, err))
}

fn coordinate<G>(get: &G, name: &'static str, limit: f64) -> Result<f64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = required(get, name)?;
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, &raw, "expected a decimal degree"))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(ConfigError::invalid(name, &raw, format!("must be within ±{limit}")));
    }
    Ok(value)
}

fn number_or<G>(get: &G, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(name, &raw, "expected a non-negative integer")),
        None => Ok(default),
    }
}

fn bool_or<G>(get: &G, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name).as_deref().map(str::trim) {
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(ConfigError::invalid(name, other, "expected 'true' or 'false'")),
        None => Ok(default),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    Missing(&'static str),
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl fmt::Display) -> Self {
        Self::Invalid {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::Missing(name) => write!(f, "{name} must be set"),
            Self::Invalid {
                name,
                value,
                reason,
            } => write!(f, "invalid {name} value '{value}': {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}
