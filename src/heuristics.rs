//! Local routing heuristics: nearest-neighbor construction and 2-opt improvement.
//!
//! These run in-process whenever the remote solver is unavailable, so they
//! must always produce a route. Both work on stop id sequences and measure
//! the open path between consecutive stops with haversine distance.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{distance_km, Coord, Stop};

/// 2-opt needs at least this many stops to have a movable segment.
pub const MIN_TWO_OPT_STOPS: usize = 4;

/// Improvements smaller than this are treated as rounding noise.
const IMPROVEMENT_EPSILON: f64 = 1e-12;

/// Orders stops greedily by always visiting the closest unvisited stop next.
///
/// Starts at `start` or, when `None`, at the first stop's location. Ties go
/// to the stop encountered first. Stops without a valid location are skipped.
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::{Coord, Stop};
/// use route_optimizer::heuristics::nearest_neighbor;
///
/// let stops = vec![
///     Stop::new("far", Coord::new(45.10, -75.0)),
///     Stop::new("near", Coord::new(45.01, -75.0)),
/// ];
///
/// let route = nearest_neighbor(&stops, Some(Coord::new(45.0, -75.0)));
/// assert_eq!(route, vec!["near", "far"]);
/// assert!(nearest_neighbor(&[], None).is_empty());
/// ```
pub fn nearest_neighbor(stops: &[Stop], start: Option<Coord>) -> Vec<String> {
    let mut remaining: Vec<(&str, Coord)> = stops
        .iter()
        .filter_map(|s| s.valid_location().map(|c| (s.id.as_str(), c)))
        .collect();

    let Some(first) = remaining.first() else {
        return Vec::new();
    };
    let mut current = start.unwrap_or(first.1);
    let mut route = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, (_, coord)) in remaining.iter().enumerate() {
            let d = distance_km(current, *coord);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        let (id, coord) = remaining.remove(best);
        route.push(id.to_string());
        current = coord;
    }

    route
}

/// Total open-path distance of a route in kilometers.
///
/// Ids that do not name a located stop contribute nothing.
pub fn route_distance_km(stops: &[Stop], route: &[String]) -> f64 {
    let coords = coordinate_index(stops);
    let points: Vec<Coord> = route.iter().filter_map(|id| coords.get(id.as_str()).copied()).collect();
    path_length(&points)
}

/// Improves a route by reversing segments until no reversal shortens it.
///
/// Returns the input unchanged when it has fewer than four stops or names
/// an id with no located stop. The first and last stops never move. Each
/// accepted reversal strictly shortens the route, so the result is never
/// longer than the input.
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::{Coord, Stop};
/// use route_optimizer::heuristics::{route_distance_km, two_opt};
///
/// let stops = vec![
///     Stop::new("a", Coord::new(0.0, 0.0)),
///     Stop::new("b", Coord::new(0.0, 0.010)),
///     Stop::new("c", Coord::new(0.005, 0.012)),
///     Stop::new("d", Coord::new(-0.015, 0.002)),
/// ];
/// let crossed: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
///
/// let improved = two_opt(&stops, &crossed);
/// assert_eq!(improved, vec!["a", "c", "b", "d"]);
/// assert!(route_distance_km(&stops, &improved) < route_distance_km(&stops, &crossed));
/// ```
pub fn two_opt(stops: &[Stop], route: &[String]) -> Vec<String> {
    let n = route.len();
    if n < MIN_TWO_OPT_STOPS {
        return route.to_vec();
    }

    let coords = coordinate_index(stops);
    let mut points = Vec::with_capacity(n);
    for id in route {
        match coords.get(id.as_str()) {
            Some(c) => points.push(*c),
            None => {
                debug!(stop_id = %id, "Unknown stop in route, skipping 2-opt");
                return route.to_vec();
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut moves = 0usize;

    'scan: loop {
        for i in 1..=n - 3 {
            for j in i + 1..=n - 2 {
                let a = points[order[i - 1]];
                let b = points[order[i]];
                let c = points[order[j]];
                let d = points[order[j + 1]];
                let delta = distance_km(a, c) + distance_km(b, d) - distance_km(a, b) - distance_km(c, d);
                if delta < -IMPROVEMENT_EPSILON {
                    order[i..=j].reverse();
                    moves += 1;
                    continue 'scan;
                }
            }
        }
        break;
    }

    debug!(stops = n, moves, "2-opt converged");
    order.into_iter().map(|i| route[i].clone()).collect()
}

/// Nearest-neighbor order, optionally refined with 2-opt.
///
/// 2-opt only runs when requested and there are at least four stops.
pub fn heuristic_route(stops: &[Stop], start: Option<Coord>, use_two_opt: bool) -> Vec<String> {
    let route = nearest_neighbor(stops, start);
    if use_two_opt && route.len() >= MIN_TWO_OPT_STOPS {
        two_opt(stops, &route)
    } else {
        route
    }
}

fn coordinate_index(stops: &[Stop]) -> HashMap<&str, Coord> {
    let mut index = HashMap::with_capacity(stops.len());
    for stop in stops {
        if let Some(c) = stop.valid_location() {
            index.entry(stop.id.as_str()).or_insert(c);
        }
    }
    index
}

fn path_length(points: &[Coord]) -> f64 {
    points.windows(2).map(|w| distance_km(w[0], w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stop(id: &str, lat: f64, lng: f64) -> Stop {
        Stop::new(id, Coord::new(lat, lng))
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn test_nearest_neighbor_empty_and_single() {
        assert!(nearest_neighbor(&[], Some(Coord::new(0.0, 0.0))).is_empty());
        assert_eq!(nearest_neighbor(&[stop("only", 45.0, -75.0)], None), vec!["only"]);
    }

    #[test]
    fn test_nearest_neighbor_starts_at_first_stop() {
        let stops = vec![
            stop("a", 45.00, -75.0),
            stop("c", 45.20, -75.0),
            stop("b", 45.10, -75.0),
        ];
        assert_eq!(nearest_neighbor(&stops, None), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_nearest_neighbor_tie_goes_to_first() {
        let stops = vec![stop("east", 45.0, -74.5), stop("west", 45.0, -75.5)];
        assert_eq!(nearest_neighbor(&stops, Some(Coord::new(45.0, -75.0)))[0], "east");
    }

    #[test]
    fn test_nearest_neighbor_skips_unlocated() {
        let stops = vec![stop("a", 45.0, -75.0), Stop::unlocated("ghost")];
        assert_eq!(nearest_neighbor(&stops, None), vec!["a"]);
    }

    #[test]
    fn test_two_opt_noop_below_four() {
        let stops = vec![stop("a", 0.0, 0.0), stop("b", 0.0, 0.01), stop("c", 0.01, 0.0)];
        let route: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(two_opt(&stops, &route), route);
    }

    #[test]
    fn test_two_opt_uncrosses_quadrilateral() {
        let stops = vec![
            stop("a", 0.0, 0.0),
            stop("b", 0.0, 0.010),
            stop("c", 0.005, 0.012),
            stop("d", -0.015, 0.002),
        ];
        let nn = nearest_neighbor(&stops, None);
        assert_eq!(nn, vec!["a", "b", "c", "d"]);

        let improved = two_opt(&stops, &nn);
        assert_eq!(improved, vec!["a", "c", "b", "d"]);
        assert!(route_distance_km(&stops, &improved) < route_distance_km(&stops, &nn));

        // Converged routes are left alone
        assert_eq!(two_opt(&stops, &improved), improved);
    }

    #[test]
    fn test_two_opt_unknown_id_returns_input() {
        let stops = vec![stop("a", 0.0, 0.0), stop("b", 0.0, 0.01), stop("c", 0.01, 0.0)];
        let route: Vec<String> = vec!["a".into(), "x".into(), "b".into(), "c".into()];
        assert_eq!(two_opt(&stops, &route), route);
    }

    #[test]
    fn test_five_tight_stops_end_to_end() {
        let stops = vec![
            stop("o1", 45.4215, -75.6972),
            stop("o2", 45.4290, -75.6890),
            stop("o3", 45.4150, -75.7050),
            stop("o4", 45.4250, -75.7100),
            stop("o5", 45.4180, -75.6850),
        ];
        let nn = nearest_neighbor(&stops, None);
        let opt = two_opt(&stops, &nn);
        let all: Vec<String> = stops.iter().map(|s| s.id.clone()).collect();
        assert_eq!(sorted(nn.clone()), sorted(all.clone()));
        assert_eq!(sorted(opt.clone()), sorted(all));
        assert!(route_distance_km(&stops, &opt) <= route_distance_km(&stops, &nn));
    }

    #[test]
    fn test_heuristic_route_respects_opt_in() {
        let stops = vec![
            stop("a", 0.0, 0.0),
            stop("b", 0.0, 0.010),
            stop("c", 0.005, 0.012),
            stop("d", -0.015, 0.002),
        ];
        assert_eq!(heuristic_route(&stops, None, false), vec!["a", "b", "c", "d"]);
        assert_eq!(heuristic_route(&stops, None, true), vec!["a", "c", "b", "d"]);
    }

    proptest! {
        #[test]
        fn prop_two_opt_never_longer(
            coords in proptest::collection::vec((44.0f64..46.0, -77.0f64..-74.0), 0..25),
        ) {
            let stops: Vec<Stop> = coords
                .iter()
                .enumerate()
                .map(|(i, (lat, lng))| stop(&format!("s{}", i), *lat, *lng))
                .collect();

            let nn = nearest_neighbor(&stops, None);
            let opt = two_opt(&stops, &nn);

            prop_assert_eq!(nn.len(), stops.len());
            prop_assert_eq!(sorted(opt.clone()), sorted(nn.clone()));
            prop_assert!(route_distance_km(&stops, &opt) <= route_distance_km(&stops, &nn) + 1e-9);
        }

        #[test]
        fn prop_distance_symmetric(
            a in (-90.0f64..90.0, -180.0f64..180.0),
            b in (-90.0f64..90.0, -180.0f64..180.0),
        ) {
            let a = Coord::new(a.0, a.1);
            let b = Coord::new(b.0, b.1);
            prop_assert_eq!(distance_km(a, b), distance_km(b, a));
            prop_assert_eq!(distance_km(a, a), 0.0);
            prop_assert!(distance_km(a, b) >= 0.0);
        }
    }
}
