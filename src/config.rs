use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::hazard::Severity;
use crate::models::location::BoundingBox;

pub const DEFAULT_DIRECTIONS_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// San Diego county and surroundings.
pub const DEFAULT_SERVICE_BOUNDS: BoundingBox = BoundingBox {
    min_lat: 32.5,
    min_lng: -117.7,
    max_lat: 33.6,
    max_lng: -116.0,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub static_dir: String,
    pub google_api_key: Option<String>,
    pub directions_base_url: String,
    pub traffic_data_path: Option<String>,
    pub orchestrator: OrchestratorConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hazards strictly above this severity disqualify a route.
    pub avoidance_threshold: Severity,
    pub max_alternates: u32,
    /// Relative duration slack within which routine affinity decides.
    pub duration_tolerance: f64,
    pub hazard_radius_km: f64,
    pub corridor_padding_km: f64,
    pub routine_match_radius_km: f64,
    pub detour_offset_km: f64,
    pub cache_ttl: Duration,
    pub cache_bucket_secs: i64,
    pub service_bounds: BoundingBox,
    pub strict_hazard_avoidance: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            avoidance_threshold: Severity::Moderate,
            max_alternates: 3,
            duration_tolerance: 0.10,
            hazard_radius_km: 0.15,
            corridor_padding_km: 2.0,
            routine_match_radius_km: 0.5,
            detour_offset_km: 1.0,
            cache_ttl: Duration::from_secs(300),
            cache_bucket_secs: 900,
            service_bounds: DEFAULT_SERVICE_BOUNDS,
            strict_hazard_avoidance: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            max_retries: 2,
            backoff_base_ms: 100,
            backoff_max_ms: 2000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = OrchestratorConfig::default();
        let threshold_level: i64 =
            parse_or_default("AVOIDANCE_THRESHOLD", defaults.avoidance_threshold.level() as i64)?;
        let avoidance_threshold = Severity::from_level(threshold_level).ok_or_else(|| {
            AppError::Internal(format!(
                "invalid AVOIDANCE_THRESHOLD: {threshold_level} is not a severity level (1-4)"
            ))
        })?;

        let service_bounds = match env::var("SERVICE_BOUNDS") {
            Ok(raw) => parse_bounds(&raw)?,
            Err(_) => defaults.service_bounds,
        };

        let orchestrator = OrchestratorConfig {
            avoidance_threshold,
            max_alternates: parse_or_default("MAX_ALTERNATES", defaults.max_alternates)?,
            duration_tolerance: parse_distance("DURATION_TOLERANCE", defaults.duration_tolerance)?,
            hazard_radius_km: parse_distance("HAZARD_RADIUS_KM", defaults.hazard_radius_km)?,
            corridor_padding_km: parse_distance("CORRIDOR_PADDING_KM", defaults.corridor_padding_km)?,
            routine_match_radius_km: parse_distance(
                "ROUTINE_MATCH_RADIUS_KM",
                defaults.routine_match_radius_km,
            )?,
            detour_offset_km: parse_distance("DETOUR_OFFSET_KM", defaults.detour_offset_km)?,
            cache_ttl: Duration::from_secs(parse_or_default(
                "ROUTE_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            cache_bucket_secs: parse_or_default("CACHE_BUCKET_SECS", defaults.cache_bucket_secs)?
                .max(1),
            service_bounds,
            strict_hazard_avoidance: parse_or_default(
                "STRICT_HAZARD_AVOIDANCE",
                defaults.strict_hazard_avoidance,
            )?,
        };

        let provider_defaults = ProviderConfig::default();
        let provider = ProviderConfig {
            timeout: Duration::from_millis(parse_or_default(
                "PROVIDER_TIMEOUT_MS",
                provider_defaults.timeout.as_millis() as u64,
            )?),
            max_retries: parse_or_default("PROVIDER_MAX_RETRIES", provider_defaults.max_retries)?,
            backoff_base_ms: parse_or_default(
                "PROVIDER_BACKOFF_BASE_MS",
                provider_defaults.backoff_base_ms,
            )?,
            backoff_max_ms: parse_or_default(
                "PROVIDER_BACKOFF_MAX_MS",
                provider_defaults.backoff_max_ms,
            )?,
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            google_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            directions_base_url: env::var("DIRECTIONS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DIRECTIONS_BASE_URL.to_string()),
            traffic_data_path: env::var("TRAFFIC_DATA_PATH").ok(),
            orchestrator,
            provider,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn parse_distance(key: &str, default: f64) -> Result<f64, AppError> {
    check_non_negative(key, parse_or_default(key, default)?)
}

/// Radii, paddings and tolerances must be finite and non-negative.
fn check_non_negative(key: &str, value: f64) -> Result<f64, AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::Internal(format!(
            "invalid {key}: {value} must be a finite, non-negative number"
        )))
    }
}

/// Parses `min_lat,min_lng,max_lat,max_lng`.
pub fn parse_bounds(raw: &str) -> Result<BoundingBox, AppError> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| AppError::Internal(format!("invalid SERVICE_BOUNDS: {err}")))?;

    let &[min_lat, min_lng, max_lat, max_lng] = parts.as_slice() else {
        return Err(AppError::Internal(
            "invalid SERVICE_BOUNDS: expected min_lat,min_lng,max_lat,max_lng".to_string(),
        ));
    };

    let bounds = BoundingBox {
        min_lat,
        min_lng,
        max_lat,
        max_lng,
    };
    if !bounds.is_valid() {
        return Err(AppError::Internal(format!(
            "invalid SERVICE_BOUNDS: {raw} is not a valid box"
        )));
    }
    Ok(bounds)
}
