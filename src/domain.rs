//! Domain model for delivery route optimization.
//!
//! # Overview
//!
//! - Geographic [`Coord`]s with haversine distance calculation
//! - Delivery [`Stop`]s with service duration, demand and optional time window
//! - [`VehicleConfig`]s with capacity, shift window and depot return policy
//! - Transient [`Cluster`]s, [`Tour`]s and [`Solution`]s produced per request
//!
//! Nothing in here is persisted: stops and vehicles arrive fresh with every
//! optimization call and everything derived from them is discarded after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Earth radius in kilometers for haversine calculation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Demand used when a stop does not state a quantity.
pub const DEFAULT_DEMAND: u32 = 1;

/// A geographic coordinate in degrees.
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::Coord;
///
/// let ottawa = Coord::new(45.4215, -75.6972);
/// let kingston = Coord::new(44.2312, -76.4860);
///
/// // Roughly 145 km apart
/// let d = ottawa.distance_km(&kingston);
/// assert!(d > 140.0 && d < 150.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in degrees (-180 to 180).
    pub lng: f64,
}

impl Coord {
    /// Creates a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns true when both components are finite and in range.
    ///
    /// ```
    /// use route_optimizer::domain::Coord;
    ///
    /// assert!(Coord::new(45.0, -75.0).is_valid());
    /// assert!(!Coord::new(95.0, -75.0).is_valid());
    /// assert!(!Coord::new(f64::NAN, 0.0).is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in kilometers. See [`distance_km`].
    pub fn distance_km(&self, other: &Coord) -> f64 {
        distance_km(*self, *other)
    }
}

/// Great-circle distance in kilometers using the haversine formula.
///
/// Symmetric, non-negative and zero for identical points. Inputs are
/// assumed finite; range validation is the caller's job.
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::{distance_km, Coord};
///
/// let a = Coord::new(0.0, 0.0);
/// let b = Coord::new(0.0, 1.0);
///
/// // 1 degree of longitude at the equator is about 111 km
/// let d = distance_km(a, b);
/// assert!(d > 110.0 && d < 112.0);
/// assert_eq!(distance_km(a, a), 0.0);
/// ```
pub fn distance_km(a: Coord, b: Coord) -> f64 {
    if a.lat == b.lat && a.lng == b.lng {
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Clamp guards asin against rounding slightly above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Arithmetic mean of a set of coordinates, `None` when empty.
///
/// ```
/// use route_optimizer::domain::{centroid, Coord};
///
/// let c = centroid([Coord::new(44.0, -76.0), Coord::new(46.0, -74.0)]).unwrap();
/// assert_eq!(c, Coord::new(45.0, -75.0));
/// assert!(centroid(Vec::<Coord>::new()).is_none());
/// ```
pub fn centroid<I>(coords: I) -> Option<Coord>
where
    I: IntoIterator<Item = Coord>,
{
    let (mut lat, mut lng, mut n) = (0.0, 0.0, 0usize);
    for c in coords {
        lat += c.lat;
        lng += c.lng;
        n += 1;
    }
    (n > 0).then(|| Coord::new(lat / n as f64, lng / n as f64))
}

/// Bounding box used as an operating-region sanity check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Creates a new bounding box.
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// Returns true if the coordinate lies strictly inside the box.
    ///
    /// ```
    /// use route_optimizer::domain::{BoundingBox, Coord};
    ///
    /// let ottawa = BoundingBox::new(45.2, -76.0, 45.6, -75.5);
    /// assert!(ottawa.contains(&Coord::new(45.42, -75.69)));
    /// assert!(!ottawa.contains(&Coord::new(43.65, -79.38)));
    /// ```
    pub fn contains(&self, c: &Coord) -> bool {
        c.lat > self.min_lat && c.lat < self.max_lat && c.lng > self.min_lng && c.lng < self.max_lng
    }
}

/// A delivery stop (one job for the solver).
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::{Coord, Stop};
///
/// let stop = Stop::new("order-1", Coord::new(45.42, -75.69))
///     .with_city("Ottawa")
///     .with_quantity(3)
///     .with_service_seconds(180);
///
/// assert_eq!(stop.demand(), 3);
/// assert_eq!(stop.service_duration_secs(300), 180);
/// assert!(stop.valid_location().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Opaque identifier, unique within a solve.
    pub id: String,
    /// Geocoded location; `None` when geocoding failed upstream.
    pub location: Option<Coord>,
    /// City label used by city-based clustering.
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub service_seconds: Option<u32>,
    #[serde(default)]
    pub service_minutes: Option<u32>,
    /// Quantity demanded; zero or missing counts as [`DEFAULT_DEMAND`].
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
}

impl Stop {
    /// Creates a stop at the given location with default service and demand.
    pub fn new(id: impl Into<String>, location: Coord) -> Self {
        Self {
            id: id.into(),
            location: Some(location),
            city: None,
            service_seconds: None,
            service_minutes: None,
            quantity: None,
            window_start: None,
            window_end: None,
        }
    }

    /// Creates a stop that has no geocoded location.
    pub fn unlocated(id: impl Into<String>) -> Self {
        Self {
            location: None,
            ..Self::new(id, Coord::new(0.0, 0.0))
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_service_seconds(mut self, seconds: u32) -> Self {
        self.service_seconds = Some(seconds);
        self
    }

    pub fn with_service_minutes(mut self, minutes: u32) -> Self {
        self.service_minutes = Some(minutes);
        self
    }

    pub fn with_time_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    /// The location if it is finite and in range; stops without one cannot be routed.
    pub fn valid_location(&self) -> Option<Coord> {
        self.location.filter(Coord::is_valid)
    }

    /// Service duration: `service_seconds`, then `service_minutes * 60`, then the default.
    ///
    /// Zero values are treated as unset.
    pub fn service_duration_secs(&self, default_secs: u32) -> u32 {
        self.service_seconds
            .filter(|&s| s > 0)
            .or_else(|| {
                self.service_minutes
                    .filter(|&m| m > 0)
                    .map(|m| m.saturating_mul(60))
            })
            .unwrap_or(default_secs)
    }

    /// Demand quantity, defaulting to [`DEFAULT_DEMAND`].
    pub fn demand(&self) -> u32 {
        self.quantity.filter(|&q| q > 0).unwrap_or(DEFAULT_DEMAND)
    }

    /// The time window when both ends are present and `start < end`.
    pub fn valid_time_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.window_start, self.window_end) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }

    /// Normalized city key: lower-cased and trimmed, `None` when blank.
    pub fn city_key(&self) -> Option<String> {
        self.city
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
    }
}

/// Splits stops into those with a routable location and the ids of those without.
pub fn partition_valid(stops: &[Stop]) -> (Vec<Stop>, Vec<String>) {
    let mut valid = Vec::with_capacity(stops.len());
    let mut excluded = Vec::new();
    for stop in stops {
        if stop.valid_location().is_some() {
            valid.push(stop.clone());
        } else {
            excluded.push(stop.id.clone());
        }
    }
    (valid, excluded)
}

/// A vehicle (driver) taking part in an optimization.
///
/// ```
/// use route_optimizer::domain::VehicleConfig;
///
/// let v = VehicleConfig::new("driver-7").with_capacity(50);
/// assert_eq!(v.capacity_or(9999), 50);
/// assert!(v.return_to_depot);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    /// Capacity; `None` uses the configured default.
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub shift_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shift_end: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub return_to_depot: bool,
}

fn default_true() -> bool {
    true
}

impl VehicleConfig {
    /// Creates a vehicle with no shift constraint that returns to the depot.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capacity: None,
            shift_start: None,
            shift_end: None,
            return_to_depot: true,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_shift(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.shift_start = Some(start);
        self.shift_end = Some(end);
        self
    }

    pub fn with_return_to_depot(mut self, return_to_depot: bool) -> Self {
        self.return_to_depot = return_to_depot;
        self
    }

    /// Capacity, falling back to `default` when unset or zero.
    pub fn capacity_or(&self, default: u32) -> u32 {
        self.capacity.filter(|&c| c > 0).unwrap_or(default)
    }
}

/// Where a resolved depot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepotSource {
    /// Operator-supplied coordinate.
    Explicit,
    /// Geocoded operator-supplied address.
    Geocoded,
    /// Centroid of all valid stop coordinates.
    Centroid,
    /// Centroid fell outside the operating region; first stop used instead.
    FirstStopFallback,
    /// Resolved depot was too far from the stops; replaced with the centroid.
    CentroidFallback,
    /// Centroid of a geographic cluster.
    ClusterCentroid,
}

impl DepotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DepotSource::Explicit => "explicit",
            DepotSource::Geocoded => "geocoded",
            DepotSource::Centroid => "centroid",
            DepotSource::FirstStopFallback => "first-stop-fallback",
            DepotSource::CentroidFallback => "centroid-fallback",
            DepotSource::ClusterCentroid => "cluster-centroid",
        }
    }
}

/// A depot location together with how it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Depot {
    pub location: Coord,
    pub source: DepotSource,
}

impl Depot {
    pub fn new(location: Coord, source: DepotSource) -> Self {
        Self { location, source }
    }
}

/// A geographically coherent group of stops. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// `cluster-{n}` in emission order.
    pub id: String,
    /// Member stops; never empty.
    pub stops: Vec<Stop>,
    pub centroid: Coord,
    /// Lower-cased city label when the cluster came from city grouping.
    pub city: Option<String>,
}

impl Cluster {
    /// Largest haversine distance from the centroid to any member.
    pub fn radius_km(&self) -> f64 {
        self.stops
            .iter()
            .filter_map(Stop::valid_location)
            .map(|c| distance_km(self.centroid, c))
            .fold(0.0, f64::max)
    }

    pub fn stop_ids(&self) -> Vec<String> {
        self.stops.iter().map(|s| s.id.clone()).collect()
    }
}

/// Ordered visiting sequence for one vehicle (depot entries excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub vehicle_id: String,
    pub stop_ids: Vec<String>,
    /// Total distance in kilometers, when known.
    pub distance_km: Option<f64>,
    /// Total duration in seconds, when known.
    pub duration_secs: Option<i64>,
}

impl Tour {
    pub fn new(vehicle_id: impl Into<String>, stop_ids: Vec<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            stop_ids,
            distance_km: None,
            duration_secs: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stop_ids.is_empty()
    }
}

/// One reason the solver gave for not placing a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignedReason {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// A stop the solver could not place, with its reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignedJob {
    pub job_id: String,
    pub reasons: Vec<UnassignedReason>,
}

impl UnassignedJob {
    pub fn new(job_id: impl Into<String>, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            reasons: vec![UnassignedReason {
                code: code.into(),
                description: description.into(),
            }],
        }
    }

    /// Reason codes joined by ", " (or "unknown").
    pub fn reason_codes(&self) -> String {
        if self.reasons.is_empty() {
            return "unknown".to_string();
        }
        self.reasons
            .iter()
            .map(|r| r.code.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Tours plus the jobs that could not be placed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub tours: Vec<Tour>,
    pub unassigned: Vec<UnassignedJob>,
}

impl Solution {
    /// True when no tour visits any stop.
    pub fn has_no_visits(&self) -> bool {
        self.tours.iter().all(Tour::is_empty)
    }
}
