//! Geographic clustering of stops.
//!
//! When several vehicles serve a widely spread stop set, the stops are
//! partitioned so that no vehicle has to shuttle between distant service
//! areas. Three strategies are tried in order:
//!
//! 1. **City**: group by normalized city label when there are between two
//!    and `2 * vehicle_count` distinct labels.
//! 2. **Proximity**: k-means style partitioning when the stops spread
//!    further than the radius from their centroid.
//! 3. **Single**: everything in one cluster.
//!
//! Stops without a valid coordinate are dropped before any strategy runs,
//! so the returned clusters partition exactly the routable stops.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::domain::{centroid, distance_km, Cluster, Coord, Stop};

/// Default maximum cluster radius in kilometers.
pub const DEFAULT_CLUSTER_RADIUS_KM: f64 = 30.0;

/// Upper bound on k-means rounds.
const MAX_ITERATIONS: usize = 10;

/// Centroid movement (km) below which k-means is considered converged.
const CONVERGENCE_KM: f64 = 0.1;

/// Which clustering strategy produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStrategy {
    /// No routable stops.
    Empty,
    City,
    Proximity,
    Single,
}

impl ClusterStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterStrategy::Empty => "empty",
            ClusterStrategy::City => "city",
            ClusterStrategy::Proximity => "proximity",
            ClusterStrategy::Single => "single",
        }
    }
}

/// Clusters together with the strategy that produced them.
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub strategy: ClusterStrategy,
    pub clusters: Vec<Cluster>,
    /// Largest distance from the overall centroid to any stop, in km.
    pub spread_km: f64,
}

/// Partitions stops into geographically coherent clusters.
///
/// `vehicle_count` below 1 is treated as 1.
///
/// # Examples
///
/// ```
/// use route_optimizer::clustering::cluster;
/// use route_optimizer::domain::{Coord, Stop};
///
/// let stops = vec![
///     Stop::new("a", Coord::new(45.42, -75.69)).with_city("Ottawa"),
///     Stop::new("b", Coord::new(45.41, -75.70)).with_city("Ottawa"),
///     Stop::new("c", Coord::new(44.23, -76.49)).with_city("Kingston"),
/// ];
///
/// let clusters = cluster(&stops, 2, 30.0);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters[0].city.as_deref(), Some("ottawa"));
/// ```
pub fn cluster(stops: &[Stop], vehicle_count: usize, max_radius_km: f64) -> Vec<Cluster> {
    plan_clusters(stops, vehicle_count, max_radius_km).clusters
}

/// Like [`cluster`], but also reports the strategy and the stop spread.
pub fn plan_clusters(stops: &[Stop], vehicle_count: usize, max_radius_km: f64) -> ClusterPlan {
    let vehicle_count = vehicle_count.max(1);
    let located: Vec<(Stop, Coord)> = stops
        .iter()
        .filter_map(|s| s.valid_location().map(|c| (s.clone(), c)))
        .collect();

    if located.is_empty() {
        return ClusterPlan {
            strategy: ClusterStrategy::Empty,
            clusters: Vec::new(),
            spread_km: 0.0,
        };
    }

    if located.len() == 1 {
        let city = located[0].0.city_key();
        return ClusterPlan {
            strategy: ClusterStrategy::Single,
            clusters: vec![build_cluster(0, located, city)],
            spread_km: 0.0,
        };
    }

    let overall = centroid(located.iter().map(|(_, c)| *c)).unwrap_or(located[0].1);
    let spread_km = located
        .iter()
        .map(|(_, c)| distance_km(*c, overall))
        .fold(0.0, f64::max);

    let distinct_cities = distinct_city_count(&located);
    if distinct_cities > 1 && distinct_cities <= vehicle_count * 2 {
        info!(
            cities = distinct_cities,
            spread_km = round1(spread_km),
            stops = located.len(),
            "Using city-based clustering"
        );
        return ClusterPlan {
            strategy: ClusterStrategy::City,
            clusters: cluster_by_city(located),
            spread_km,
        };
    }

    if spread_km > max_radius_km && max_radius_km > 0.0 {
        let k = ((spread_km / max_radius_km).ceil() as usize).min(vehicle_count).max(1);
        info!(
            spread_km = round1(spread_km),
            k,
            stops = located.len(),
            "Stops widely spread, using proximity clustering"
        );
        return ClusterPlan {
            strategy: ClusterStrategy::Proximity,
            clusters: cluster_by_proximity(located, k, vehicle_count),
            spread_km,
        };
    }

    info!(
        spread_km = round1(spread_km),
        stops = located.len(),
        "All stops within radius, using single cluster"
    );
    let (stops, _): (Vec<Stop>, Vec<Coord>) = located.into_iter().unzip();
    ClusterPlan {
        strategy: ClusterStrategy::Single,
        clusters: vec![Cluster {
            id: cluster_id(0),
            stops,
            centroid: overall,
            city: None,
        }],
        spread_km,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn cluster_id(index: usize) -> String {
    format!("cluster-{}", index)
}

fn distinct_city_count(located: &[(Stop, Coord)]) -> usize {
    let mut seen: Vec<String> = Vec::new();
    for key in located.iter().filter_map(|(s, _)| s.city_key()) {
        if !seen.contains(&key) {
            seen.push(key);
        }
    }
    seen.len()
}

/// Groups by normalized city label in first-seen order. Missing labels share one group.
fn cluster_by_city(located: Vec<(Stop, Coord)>) -> Vec<Cluster> {
    let mut order: Vec<Option<String>> = Vec::new();
    let mut groups: HashMap<Option<String>, Vec<(Stop, Coord)>> = HashMap::new();

    for (stop, coord) in located {
        let key = stop.city_key();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push((stop, coord));
    }

    order
        .into_iter()
        .enumerate()
        .filter_map(|(i, key)| {
            let members = groups.remove(&key)?;
            Some(build_cluster(i, members, key))
        })
        .collect()
}

fn build_cluster(index: usize, members: Vec<(Stop, Coord)>, city: Option<String>) -> Cluster {
    let center = centroid(members.iter().map(|(_, c)| *c)).unwrap_or(members[0].1);
    let (stops, _): (Vec<Stop>, Vec<Coord>) = members.into_iter().unzip();
    Cluster {
        id: cluster_id(index),
        stops,
        centroid: center,
        city,
    }
}

fn nearest_centroid(point: Coord, centroids: &[Coord]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = distance_km(point, *c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn assign(located: &[(Stop, Coord)], centroids: &[Coord]) -> Vec<Vec<usize>> {
    let mut buckets = vec![Vec::new(); centroids.len()];
    for (idx, (_, coord)) in located.iter().enumerate() {
        buckets[nearest_centroid(*coord, centroids)].push(idx);
    }
    buckets
}

fn cluster_by_proximity(located: Vec<(Stop, Coord)>, k: usize, vehicle_count: usize) -> Vec<Cluster> {
    if located.len() <= vehicle_count {
        debug!(stops = located.len(), "Fewer stops than vehicles, one cluster per stop");
        return located
            .into_iter()
            .enumerate()
            .map(|(i, member)| build_cluster(i, vec![member], None))
            .collect();
    }

    let step = located.len() / k;
    let mut centroids: Vec<Coord> = (0..k).map(|i| located[i * step].1).collect();

    for iteration in 0..MAX_ITERATIONS {
        let buckets = assign(&located, &centroids);
        let updated: Vec<Coord> = buckets
            .iter()
            .zip(&centroids)
            .map(|(bucket, previous)| centroid(bucket.iter().map(|&i| located[i].1)).unwrap_or(*previous))
            .collect();

        let moved = centroids
            .iter()
            .zip(&updated)
            .any(|(a, b)| distance_km(*a, *b) > CONVERGENCE_KM);
        centroids = updated;

        if !moved {
            debug!(iterations = iteration + 1, "k-means converged");
            break;
        }
    }

    let buckets = assign(&located, &centroids);
    let mut slots: Vec<Option<(Stop, Coord)>> = located.into_iter().map(Some).collect();

    buckets
        .into_iter()
        .filter(|b| !b.is_empty())
        .enumerate()
        .map(|(i, bucket)| {
            let members = bucket.into_iter().filter_map(|idx| slots[idx].take()).collect();
            build_cluster(i, members, None)
        })
        .collect()
}
