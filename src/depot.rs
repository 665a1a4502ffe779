//! Depot resolution.
//!
//! A depot is picked from, in order of precedence:
//!
//! 1. an explicit operator-supplied coordinate,
//! 2. a geocoded operator-supplied address,
//! 3. the centroid of all valid stop coordinates.
//!
//! The centroid is checked against an optional operating region and falls
//! back to the first stop when it lands outside. A geocoded or fallback
//! depot farther than the maximum distance from the most distant stop is
//! discarded in favour of the stop centroid. An explicit coordinate is
//! always honoured as given.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{centroid, distance_km, BoundingBox, Coord, Depot, DepotSource, Stop};
use crate::error::DepotError;

/// Default maximum depot-to-stop distance in kilometers.
pub const DEFAULT_MAX_DEPOT_DISTANCE_KM: f64 = 80.0;

/// A geocoded address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub label: Option<String>,
}

impl GeocodeResult {
    pub fn coord(&self) -> Coord {
        Coord::new(self.lat, self.lng)
    }
}

/// Address lookup used to place a depot.
///
/// Implementations swallow their own failures: `None` means "no usable
/// result", whatever the reason.
pub trait Geocoder: Send + Sync {
    fn geocode(
        &self,
        address: &str,
        bias: Option<Coord>,
    ) -> impl Future<Output = Option<GeocodeResult>> + Send;
}

/// Geocoder that never finds anything. Used when no geocoding service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    async fn geocode(&self, _address: &str, _bias: Option<Coord>) -> Option<GeocodeResult> {
        None
    }
}

/// Resolves the depot for a set of stops.
pub struct DepotResolver<G> {
    geocoder: G,
    max_distance_km: f64,
    operating_region: Option<BoundingBox>,
}

impl<G: Geocoder> DepotResolver<G> {
    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder,
            max_distance_km: DEFAULT_MAX_DEPOT_DISTANCE_KM,
            operating_region: None,
        }
    }

    pub fn with_max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = km;
        self
    }

    /// Centroids outside this region fall back to the first stop.
    pub fn with_operating_region(mut self, region: Option<BoundingBox>) -> Self {
        self.operating_region = region;
        self
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    /// Picks a depot for `stops`.
    ///
    /// Fails with [`DepotError::NoValidStops`] only when no explicit
    /// location resolves and no stop has a valid coordinate.
    pub async fn resolve(
        &self,
        stops: &[Stop],
        explicit: Option<Coord>,
        address: Option<&str>,
    ) -> Result<Depot, DepotError> {
        if let Some(coord) = explicit {
            if coord.is_valid() {
                info!(lat = coord.lat, lng = coord.lng, "Using explicit depot");
                return Ok(Depot::new(coord, DepotSource::Explicit));
            }
            warn!(lat = coord.lat, lng = coord.lng, "Ignoring out-of-range explicit depot");
        }

        let points: Vec<Coord> = stops.iter().filter_map(Stop::valid_location).collect();
        let stop_centroid = centroid(points.iter().copied());

        if let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) {
            match self.geocoder.geocode(address, stop_centroid).await {
                Some(result) if result.coord().is_valid() => {
                    info!(
                        lat = result.lat,
                        lng = result.lng,
                        address,
                        "Using geocoded depot"
                    );
                    let depot = Depot::new(result.coord(), DepotSource::Geocoded);
                    return Ok(self.clamp_to_stops(depot, &points));
                }
                _ => warn!(address, "Depot address did not geocode, using stop centroid"),
            }
        }

        let Some(center) = stop_centroid else {
            return Err(DepotError::NoValidStops);
        };

        if let Some(region) = &self.operating_region {
            if !region.contains(&center) {
                warn!(
                    lat = center.lat,
                    lng = center.lng,
                    "Depot centroid outside operating region, using first stop"
                );
                let depot = Depot::new(points[0], DepotSource::FirstStopFallback);
                return Ok(self.clamp_to_stops(depot, &points));
            }
        }

        info!(
            lat = center.lat,
            lng = center.lng,
            stops = points.len(),
            "Using stop centroid as depot"
        );
        Ok(Depot::new(center, DepotSource::Centroid))
    }

    /// Replaces a depot that is too far from the most distant stop with the stop centroid.
    fn clamp_to_stops(&self, depot: Depot, points: &[Coord]) -> Depot {
        let Some(center) = centroid(points.iter().copied()) else {
            return depot;
        };
        let farthest = points
            .iter()
            .map(|p| distance_km(depot.location, *p))
            .fold(0.0, f64::max);

        if farthest > self.max_distance_km {
            warn!(
                farthest_km = (farthest * 10.0).round() / 10.0,
                max_km = self.max_distance_km,
                source = depot.source.as_str(),
                "Depot too far from stops, using stop centroid"
            );
            return Depot::new(center, DepotSource::CentroidFallback);
        }
        depot
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory geocoder that records the queries it receives.
    #[derive(Default)]
    pub(crate) struct MapGeocoder {
        pub entries: HashMap<String, GeocodeResult>,
        pub calls: Mutex<Vec<(String, Option<Coord>)>>,
    }

    impl MapGeocoder {
        pub fn with(address: &str, lat: f64, lng: f64) -> Self {
            let mut entries = HashMap::new();
            entries.insert(
                address.to_string(),
                GeocodeResult {
                    lat,
                    lng,
                    label: Some(address.to_string()),
                },
            );
            Self {
                entries,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Geocoder for MapGeocoder {
        async fn geocode(&self, address: &str, bias: Option<Coord>) -> Option<GeocodeResult> {
            self.calls.lock().push((address.to_string(), bias));
            self.entries.get(address).cloned()
        }
    }

    fn tight_stops() -> Vec<Stop> {
        vec![
            Stop::new("a", Coord::new(45.01, -75.01)),
            Stop::new("b", Coord::new(44.99, -74.99)),
            Stop::new("c", Coord::new(45.01, -74.99)),
            Stop::new("d", Coord::new(44.99, -75.01)),
        ]
    }

    #[tokio::test]
    async fn test_explicit_coordinate_wins_regardless_of_stops() {
        let resolver = DepotResolver::new(MapGeocoder::with("HQ", 45.0, -75.0));
        let explicit = Coord::new(43.65, -79.38); // ~400 km from the stops
        let depot = resolver
            .resolve(&tight_stops(), Some(explicit), Some("HQ"))
            .await
            .unwrap();
        assert_eq!(depot, Depot::new(explicit, DepotSource::Explicit));
        assert!(resolver.geocoder().calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_coordinate_without_stops() {
        let resolver = DepotResolver::new(NoGeocoder);
        let depot = resolver.resolve(&[], Some(Coord::new(45.0, -75.0)), None).await.unwrap();
        assert_eq!(depot.source, DepotSource::Explicit);
    }

    #[tokio::test]
    async fn test_centroid_of_tight_stops() {
        let resolver = DepotResolver::new(NoGeocoder);
        let depot = resolver.resolve(&tight_stops(), None, None).await.unwrap();
        assert_eq!(depot.source, DepotSource::Centroid);
        assert!((depot.location.lat - 45.0).abs() < 1e-9);
        assert!((depot.location.lng + 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_geocoded_address_used_with_centroid_bias() {
        let resolver = DepotResolver::new(MapGeocoder::with("1 Main St", 45.02, -75.02));
        let depot = resolver.resolve(&tight_stops(), None, Some(" 1 Main St ")).await.unwrap();
        assert_eq!(depot.source, DepotSource::Geocoded);
        assert_eq!(depot.location, Coord::new(45.02, -75.02));

        let calls = resolver.geocoder().calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "1 Main St");
        assert!(calls[0].1.is_some());
    }

    #[tokio::test]
    async fn test_failed_geocode_falls_through_to_centroid() {
        let resolver = DepotResolver::new(MapGeocoder::default());
        let depot = resolver.resolve(&tight_stops(), None, Some("nowhere")).await.unwrap();
        assert_eq!(depot.source, DepotSource::Centroid);
    }

    #[tokio::test]
    async fn test_far_geocoded_depot_clamped_to_centroid() {
        // Toronto is ~400 km from the stops
        let resolver = DepotResolver::new(MapGeocoder::with("Toronto", 43.65, -79.38));
        let depot = resolver.resolve(&tight_stops(), None, Some("Toronto")).await.unwrap();
        assert_eq!(depot.source, DepotSource::CentroidFallback);
        assert!((depot.location.lat - 45.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_operating_region_trip_uses_first_stop() {
        let ottawa = BoundingBox::new(45.2, -76.0, 45.6, -75.5);
        let resolver = DepotResolver::new(NoGeocoder).with_operating_region(Some(ottawa));
        let depot = resolver.resolve(&tight_stops(), None, None).await.unwrap();
        assert_eq!(depot, Depot::new(Coord::new(45.01, -75.01), DepotSource::FirstStopFallback));
    }

    #[tokio::test]
    async fn test_no_valid_stops_is_an_error() {
        let resolver = DepotResolver::new(NoGeocoder);
        let stops = vec![Stop::unlocated("x")];
        assert_eq!(resolver.resolve(&stops, None, None).await, Err(DepotError::NoValidStops));
    }

    #[tokio::test]
    async fn test_invalid_explicit_ignored() {
        let resolver = DepotResolver::new(NoGeocoder);
        let depot = resolver
            .resolve(&tight_stops(), Some(Coord::new(123.0, 0.0)), None)
            .await
            .unwrap();
        assert_eq!(depot.source, DepotSource::Centroid);
    }
}
