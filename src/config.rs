//! Environment-driven configuration.
//!
//! Every setting has a default, so an empty environment yields a working
//! (if credential-less) configuration. Values that are present but do not
//! parse are rejected with [`ConfigError::Invalid`].

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;

use crate::auth::DEFAULT_TOKEN_URL;
use crate::clustering::DEFAULT_CLUSTER_RADIUS_KM;
use crate::depot::DEFAULT_MAX_DEPOT_DISTANCE_KM;
use crate::domain::{BoundingBox, Coord};
use crate::error::ConfigError;
use crate::geocoding::DEFAULT_GEOCODE_URL;
use crate::problem::{Costs, ProblemOptions, TimeWindowPolicy, DEFAULT_CAPACITY, DEFAULT_SERVICE_SECONDS};
use crate::tour_planning::{DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 7860;

/// Operator-configured depot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepotConfig {
    pub coord: Option<Coord>,
    pub address: Option<String>,
}

/// Settings for the optimization pipeline.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub default_capacity: u32,
    pub max_depot_distance_km: f64,
    pub cluster_radius_km: f64,
    pub default_service_seconds: u32,
    pub time_windows: TimeWindowPolicy,
    pub single_solve_timeout: Duration,
    pub cluster_solve_timeout: Duration,
    pub poll_interval: Duration,
    pub max_parallel_clusters: usize,
    pub depot: DepotConfig,
    pub operating_region: Option<BoundingBox>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            max_depot_distance_km: DEFAULT_MAX_DEPOT_DISTANCE_KM,
            cluster_radius_km: DEFAULT_CLUSTER_RADIUS_KM,
            default_service_seconds: DEFAULT_SERVICE_SECONDS,
            time_windows: TimeWindowPolicy::Soft,
            single_solve_timeout: Duration::from_secs(90),
            cluster_solve_timeout: Duration::from_secs(120),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_parallel_clusters: 4,
            depot: DepotConfig::default(),
            operating_region: None,
        }
    }
}

impl OptimizerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup.
    ///
    /// ```
    /// use route_optimizer::config::OptimizerConfig;
    ///
    /// let config = OptimizerConfig::from_lookup(|key| match key {
    ///     "ROUTE_CAPACITY" => Some("40".to_string()),
    ///     "TIME_WINDOWS" => Some("hard".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.default_capacity, 40);
    /// assert_eq!(config.max_depot_distance_km, 80.0);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Lookup(&lookup);

        let depot_lat: Option<f64> = env.parse_opt("DEPOT_LAT")?;
        let depot_lng: Option<f64> = env.parse_opt("DEPOT_LNG")?;

        Ok(Self {
            default_capacity: env.parse_or("ROUTE_CAPACITY", defaults.default_capacity)?,
            max_depot_distance_km: env.parse_or("MAX_DEPOT_DISTANCE_KM", defaults.max_depot_distance_km)?,
            cluster_radius_km: env.parse_or("CLUSTER_RADIUS_KM", defaults.cluster_radius_km)?,
            default_service_seconds: env.parse_or("DEFAULT_SERVICE_SECONDS", defaults.default_service_seconds)?,
            time_windows: env.parse_or("TIME_WINDOWS", defaults.time_windows)?,
            single_solve_timeout: Duration::from_secs(
                env.parse_or("SINGLE_SOLVE_TIMEOUT_SECS", defaults.single_solve_timeout.as_secs())?,
            ),
            cluster_solve_timeout: Duration::from_secs(
                env.parse_or("CLUSTER_SOLVE_TIMEOUT_SECS", defaults.cluster_solve_timeout.as_secs())?,
            ),
            poll_interval: Duration::from_millis(
                env.parse_or("POLL_INTERVAL_MS", defaults.poll_interval.as_millis() as u64)?,
            ),
            max_parallel_clusters: env
                .parse_or("MAX_PARALLEL_CLUSTERS", defaults.max_parallel_clusters)?
                .max(1),
            depot: DepotConfig {
                coord: depot_lat.zip(depot_lng).map(|(lat, lng)| Coord::new(lat, lng)),
                address: env.string("DEPOT_ADDRESS"),
            },
            operating_region: env
                .string("OPERATING_REGION")
                .map(|raw| parse_region(&raw))
                .transpose()?,
        })
    }

    /// Problem builder options for today's service date.
    pub fn problem_options(&self) -> ProblemOptions {
        ProblemOptions {
            default_capacity: self.default_capacity,
            default_service_seconds: self.default_service_seconds,
            max_depot_distance_km: self.max_depot_distance_km,
            time_windows: self.time_windows,
            service_date: Utc::now().date_naive(),
            costs: Costs::default(),
        }
    }
}

/// Which credential flow the solver client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey,
    OAuth,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apikey" | "api_key" => Ok(AuthMode::ApiKey),
            "oauth" => Ok(AuthMode::OAuth),
            other => Err(format!("unknown auth mode: {}", other)),
        }
    }
}

/// Endpoints and credentials for external services.
#[derive(Debug, Clone)]
pub struct SolverEndpointConfig {
    pub base_url: String,
    pub auth_mode: AuthMode,
    pub api_key: Option<String>,
    pub token_url: String,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub geocode_url: String,
    pub port: u16,
}

impl SolverEndpointConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        Ok(Self {
            base_url: env.string("TOUR_PLANNING_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth_mode: env.parse_or("HERE_TOUR_PLANNING_AUTH", AuthMode::ApiKey)?,
            api_key: env.string("HERE_API_KEY").or_else(|| env.string("HERE_SERVER_API_KEY")),
            token_url: env.string("HERE_OAUTH_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            access_key_id: env.string("HERE_ACCESS_KEY_ID"),
            access_key_secret: env.string("HERE_ACCESS_KEY_SECRET"),
            geocode_url: env.string("GEOCODE_URL").unwrap_or_else(|| DEFAULT_GEOCODE_URL.to_string()),
            port: env.parse_or("PORT", DEFAULT_PORT)?,
        })
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed, non-empty value.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }
}

/// Parses `min_lat,min_lng,max_lat,max_lng`.
fn parse_region(raw: &str) -> Result<BoundingBox, ConfigError> {
    let invalid = || ConfigError::Invalid {
        key: "OPERATING_REGION".to_string(),
        value: raw.to_string(),
    };
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    match parts.as_slice() {
        [min_lat, min_lng, max_lat, max_lng] if min_lat < max_lat && min_lng < max_lng => {
            Ok(BoundingBox::new(*min_lat, *min_lng, *max_lat, *max_lng))
        }
        _ => Err(invalid()),
    }
}
