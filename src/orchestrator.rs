//! Route orchestration: the remote-first, heuristic-fallback policy.
//!
//! # Single vehicle
//!
//! ```text
//! START -> BUILD_PROBLEM -> REMOTE_SOLVE -> SUCCESS
//!                                        \-> REMOTE_FAILED -> HEURISTIC_SOLVE -> SUCCESS
//! ```
//!
//! # Several vehicles
//!
//! Stops are clustered first, vehicles are assigned to clusters, and every
//! cluster is solved on its own (concurrently, bounded by
//! `max_parallel_clusters`). A cluster whose remote solve fails falls back
//! to an even split of its stops over its vehicles, each slice routed with
//! nearest neighbor (plus 2-opt when requested). One cluster falling back
//! never affects another.
//!
//! The only hard failures are no routable stops, no vehicles and an
//! invalid vehicle shift. Everything else degrades to a heuristic route
//! and is reported through [`Outcome::Degraded`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clustering::{plan_clusters, ClusterStrategy};
use crate::config::OptimizerConfig;
use crate::depot::{DepotResolver, Geocoder};
use crate::domain::{
    distance_km, partition_valid, Cluster, Coord, Depot, DepotSource, Solution, Stop, Tour,
    UnassignedJob, VehicleConfig,
};
use crate::error::{OptimizeError, SolverError};
use crate::heuristics::{heuristic_route, nearest_neighbor};
use crate::problem::{build_problem, resolve_shift, ProblemOptions, MIN_SHIFT_MINUTES};
use crate::tour_planning::{SolverTransport, TourPlanningClient};

/// Reason code for valid stops the solver neither routed nor reported.
pub const MISSING_FROM_SOLUTION: &str = "MISSING_FROM_SOLUTION";

/// One optimization call.
#[derive(Debug, Clone, Default)]
pub struct OptimizeRequest {
    pub stops: Vec<Stop>,
    pub vehicles: Vec<VehicleConfig>,
    /// Overrides the configured depot coordinate.
    pub depot: Option<Coord>,
    /// Overrides the configured depot address.
    pub depot_address: Option<String>,
    /// Refine heuristic routes with 2-opt.
    pub use_two_opt: bool,
    /// Unresolved clusters fall back to the heuristic once this passes.
    pub deadline: Option<Instant>,
}

/// Why a heuristic route was used instead of the remote solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The remote solve failed.
    Remote(SolverError),
    /// The remote solver answered but visited no stop.
    EmptySolution,
    /// The request deadline passed before the remote solve finished.
    DeadlineExceeded,
    /// The request was cancelled.
    Cancelled,
}

impl DegradeReason {
    /// Short machine-friendly kind: the solver error kind, or the local cause.
    pub fn kind(&self) -> &'static str {
        match self {
            DegradeReason::Remote(e) => e.kind(),
            DegradeReason::EmptySolution => "empty-solution",
            DegradeReason::DeadlineExceeded => "deadline",
            DegradeReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::Remote(e) => write!(f, "{}", e),
            DegradeReason::EmptySolution => write!(f, "Solver returned no routed stops"),
            DegradeReason::DeadlineExceeded => write!(f, "Deadline exceeded"),
            DegradeReason::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Result of solving one cluster.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Remote solution, with any jobs it could not place.
    Solved {
        tours: Vec<Tour>,
        unassigned: Vec<UnassignedJob>,
    },
    /// Local heuristic route.
    Degraded { tours: Vec<Tour>, reason: DegradeReason },
}

impl Outcome {
    pub fn tours(&self) -> &[Tour] {
        match self {
            Outcome::Solved { tours, .. } | Outcome::Degraded { tours, .. } => tours,
        }
    }

    pub fn unassigned(&self) -> &[UnassignedJob] {
        match self {
            Outcome::Solved { unassigned, .. } => unassigned,
            Outcome::Degraded { .. } => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn degrade_reason(&self) -> Option<&DegradeReason> {
        match self {
            Outcome::Degraded { reason, .. } => Some(reason),
            Outcome::Solved { .. } => None,
        }
    }
}

/// A solved cluster.
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    pub cluster_id: String,
    pub city: Option<String>,
    pub depot: Depot,
    pub stop_count: usize,
    pub vehicle_ids: Vec<String>,
    pub outcome: Outcome,
}

/// One vehicle's route, annotated with the cluster it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    pub cluster_id: String,
    pub city: Option<String>,
    pub tour: Tour,
    pub degraded: bool,
}

impl PlannedRoute {
    /// Human-readable name: `"{City} - Route n"`, or `"Route n"` without a city.
    ///
    /// ```
    /// use route_optimizer::domain::Tour;
    /// use route_optimizer::orchestrator::PlannedRoute;
    ///
    /// let route = PlannedRoute {
    ///     cluster_id: "cluster-0".into(),
    ///     city: Some("ottawa".into()),
    ///     tour: Tour::new("v1", vec![]),
    ///     degraded: false,
    /// };
    /// assert_eq!(route.display_name(1), "Ottawa - Route 1");
    /// ```
    pub fn display_name(&self, index: usize) -> String {
        match self.city.as_deref() {
            Some(city) => format!("{} - Route {}", title_case(city), index),
            None => format!("Route {}", index),
        }
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything an optimization call produced.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub strategy: ClusterStrategy,
    pub clusters: Vec<ClusterOutcome>,
    /// Stops left out because they have no valid coordinate.
    pub excluded: Vec<String>,
    /// Vehicles left out of a multi-vehicle plan, with why.
    pub rejected_vehicles: Vec<OptimizeError>,
}

impl OptimizationResult {
    /// All tours, in cluster order.
    pub fn routes(&self) -> Vec<PlannedRoute> {
        self.clusters
            .iter()
            .flat_map(|c| {
                c.outcome.tours().iter().map(move |tour| PlannedRoute {
                    cluster_id: c.cluster_id.clone(),
                    city: c.city.clone(),
                    tour: tour.clone(),
                    degraded: c.outcome.is_degraded(),
                })
            })
            .collect()
    }

    pub fn unassigned(&self) -> Vec<UnassignedJob> {
        self.clusters
            .iter()
            .flat_map(|c| c.outcome.unassigned().iter().cloned())
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.clusters.iter().any(|c| c.outcome.is_degraded())
    }

    pub fn routed_stop_count(&self) -> usize {
        self.clusters
            .iter()
            .flat_map(|c| c.outcome.tours())
            .map(|t| t.stop_ids.len())
            .sum()
    }
}

/// Splits vehicles over clusters deterministically.
///
/// Vehicles are sorted by id. With at least as many vehicles as clusters,
/// every cluster gets one and the rest go, one at a time, to the cluster
/// with the most stops per vehicle; each cluster then takes a contiguous
/// run of the sorted list. With fewer vehicles than clusters, cluster `i`
/// shares vehicle `i % vehicles`.
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::{Cluster, Coord, Stop, VehicleConfig};
/// use route_optimizer::orchestrator::assign_vehicles;
///
/// let cluster = |id: &str, n: usize| Cluster {
///     id: id.to_string(),
///     stops: (0..n).map(|i| Stop::new(format!("{}-{}", id, i), Coord::new(45.0, -75.0))).collect(),
///     centroid: Coord::new(45.0, -75.0),
///     city: None,
/// };
/// let clusters = vec![cluster("small", 2), cluster("big", 10)];
/// let vehicles: Vec<VehicleConfig> = ["c", "a", "b"].iter().map(|id| VehicleConfig::new(*id)).collect();
///
/// let assigned = assign_vehicles(&clusters, &vehicles);
/// let ids = |i: usize| assigned[i].iter().map(|v| v.id.as_str()).collect::<Vec<_>>();
/// assert_eq!(ids(0), vec!["a"]);
/// assert_eq!(ids(1), vec!["b", "c"]);
/// ```
pub fn assign_vehicles(clusters: &[Cluster], vehicles: &[VehicleConfig]) -> Vec<Vec<VehicleConfig>> {
    if clusters.is_empty() || vehicles.is_empty() {
        return vec![Vec::new(); clusters.len()];
    }

    let mut sorted = vehicles.to_vec();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    if sorted.len() < clusters.len() {
        return (0..clusters.len())
            .map(|i| vec![sorted[i % sorted.len()].clone()])
            .collect();
    }

    let mut counts = vec![1usize; clusters.len()];
    for _ in clusters.len()..sorted.len() {
        let mut best = 0;
        let mut best_load = f64::NEG_INFINITY;
        for (i, cluster) in clusters.iter().enumerate() {
            let load = cluster.stops.len() as f64 / counts[i] as f64;
            if load > best_load {
                best_load = load;
                best = i;
            }
        }
        counts[best] += 1;
    }

    let mut next = sorted.into_iter();
    counts
        .into_iter()
        .map(|n| next.by_ref().take(n).collect())
        .collect()
}

/// Splits vehicles into those with a plannable shift and errors for the rest.
pub fn partition_shifts(
    vehicles: &[VehicleConfig],
    options: &ProblemOptions,
) -> (Vec<VehicleConfig>, Vec<OptimizeError>) {
    let mut usable = Vec::with_capacity(vehicles.len());
    let mut rejected = Vec::new();
    for vehicle in vehicles {
        let (start, end) = resolve_shift(vehicle, options.service_date);
        let minutes = (end - start).num_minutes();
        if minutes <= MIN_SHIFT_MINUTES {
            rejected.push(OptimizeError::InvalidShift {
                vehicle_id: vehicle.id.clone(),
                minutes,
            });
        } else {
            usable.push(vehicle.clone());
        }
    }
    (usable, rejected)
}

/// Fails with [`OptimizeError::InvalidShift`] for the first vehicle whose shift is too short.
pub fn validate_shifts(vehicles: &[VehicleConfig], options: &ProblemOptions) -> Result<(), OptimizeError> {
    match partition_shifts(vehicles, options).1.into_iter().next() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Keeps only known, first-seen stop ids in tours and reports every known stop
/// that is neither routed nor already unassigned.
fn reconcile(solution: Solution, stops: &[Stop]) -> (Vec<Tour>, Vec<UnassignedJob>) {
    let known: HashSet<&str> = stops.iter().map(|s| s.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();

    let mut tours = Vec::with_capacity(solution.tours.len());
    for mut tour in solution.tours {
        tour.stop_ids.retain(|id| {
            if !known.contains(id.as_str()) {
                warn!(job_id = %id, "Dropping unknown job from solution");
                return false;
            }
            seen.insert(id.clone())
        });
        if !tour.is_empty() {
            tours.push(tour);
        }
    }

    let mut unassigned = Vec::new();
    for job in solution.unassigned {
        if known.contains(job.job_id.as_str()) && seen.insert(job.job_id.clone()) {
            unassigned.push(job);
        }
    }

    for stop in stops {
        if !seen.contains(&stop.id) {
            warn!(job_id = %stop.id, "Stop missing from solution");
            unassigned.push(UnassignedJob::new(
                stop.id.clone(),
                MISSING_FROM_SOLUTION,
                "Stop appeared in neither a tour nor the unassigned list",
            ));
        }
    }

    (tours, unassigned)
}

/// Local route for one vehicle. Distance runs from the depot through the
/// stops, and back when the vehicle returns to the depot.
fn heuristic_tour(vehicle: &VehicleConfig, stops: &[Stop], depot: Coord, use_two_opt: bool) -> Tour {
    let stop_ids = heuristic_route(stops, Some(depot), use_two_opt);

    let by_id: HashMap<&str, Coord> = stops
        .iter()
        .filter_map(|s| s.valid_location().map(|c| (s.id.as_str(), c)))
        .collect();
    let mut points = vec![depot];
    points.extend(stop_ids.iter().filter_map(|id| by_id.get(id.as_str()).copied()));
    if vehicle.return_to_depot {
        points.push(depot);
    }
    let distance: f64 = points.windows(2).map(|w| distance_km(w[0], w[1])).sum();

    Tour {
        vehicle_id: vehicle.id.clone(),
        stop_ids,
        distance_km: Some(distance),
        duration_secs: None,
    }
}

/// Splits stops evenly over vehicles and routes each slice locally.
///
/// Stops are first ordered by nearest neighbor from the depot, then cut
/// into `ceil(n / vehicles)` contiguous slices so each slice stays compact.
pub fn heuristic_split(
    stops: &[Stop],
    vehicles: &[VehicleConfig],
    depot: Coord,
    use_two_opt: bool,
) -> Vec<Tour> {
    if stops.is_empty() || vehicles.is_empty() {
        return Vec::new();
    }
    if vehicles.len() == 1 {
        return vec![heuristic_tour(&vehicles[0], stops, depot, use_two_opt)];
    }

    let order = nearest_neighbor(stops, Some(depot));
    let by_id: HashMap<&str, &Stop> = stops.iter().map(|s| (s.id.as_str(), s)).collect();
    let ordered: Vec<Stop> = order
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).map(|s| (*s).clone()))
        .collect();

    let chunk = ordered.len().div_ceil(vehicles.len()).max(1);
    ordered
        .chunks(chunk)
        .zip(vehicles)
        .map(|(slice, vehicle)| heuristic_tour(vehicle, slice, depot, use_two_opt))
        .collect()
}

/// The orchestrator. Owns the remote client and the depot resolver.
pub struct RouteOrchestrator<T, G> {
    client: TourPlanningClient<T>,
    depots: DepotResolver<G>,
    config: OptimizerConfig,
}

impl<T: SolverTransport, G: Geocoder> RouteOrchestrator<T, G> {
    pub fn new(transport: T, geocoder: G, config: OptimizerConfig) -> Self {
        let client = TourPlanningClient::new(transport).with_poll_interval(config.poll_interval);
        let depots = DepotResolver::new(geocoder)
            .with_max_distance_km(config.max_depot_distance_km)
            .with_operating_region(config.operating_region);
        Self {
            client,
            depots,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn client(&self) -> &TourPlanningClient<T> {
        &self.client
    }

    /// Produces routes for every valid stop.
    ///
    /// Fails only when there is no routable stop, no vehicle, or no vehicle
    /// with a plannable shift. With several vehicles, one whose shift is too
    /// short is left out and listed in `rejected_vehicles`. Remote failures,
    /// timeouts, the request deadline and `cancel` all fall back to
    /// heuristic routes.
    pub async fn optimize(
        &self,
        request: &OptimizeRequest,
        cancel: &CancellationToken,
    ) -> Result<OptimizationResult, OptimizeError> {
        if request.vehicles.is_empty() {
            return Err(OptimizeError::NoVehicles);
        }
        let (valid, excluded) = partition_valid(&request.stops);
        if valid.is_empty() {
            return Err(OptimizeError::NoValidStops);
        }
        if !excluded.is_empty() {
            warn!(count = excluded.len(), stops = ?excluded, "Excluding stops without valid coordinates");
        }

        let options = self.config.problem_options();
        let (vehicles, rejected_vehicles) = if request.vehicles.len() == 1 {
            validate_shifts(&request.vehicles, &options)?;
            (request.vehicles.clone(), Vec::new())
        } else {
            let (usable, rejected) = partition_shifts(&request.vehicles, &options);
            if usable.is_empty() {
                return Err(rejected.into_iter().next().unwrap_or(OptimizeError::NoVehicles));
            }
            for e in &rejected {
                warn!(vehicle_id = e.vehicle_id().unwrap_or_default(), error = %e, "Leaving vehicle out of the plan");
            }
            (usable, rejected)
        };

        let explicit = request.depot.or(self.config.depot.coord);
        let address = request
            .depot_address
            .as_deref()
            .or(self.config.depot.address.as_deref());

        info!(
            stops = valid.len(),
            vehicles = vehicles.len(),
            excluded = excluded.len(),
            "Optimization started"
        );

        if request.vehicles.len() == 1 {
            let depot = self.depots.resolve(&valid, explicit, address).await?;
            let cluster = Cluster {
                id: "cluster-0".to_string(),
                centroid: depot.location,
                city: None,
                stops: valid,
            };
            let outcome = self
                .solve_cluster(
                    &cluster,
                    depot,
                    &vehicles,
                    &options,
                    self.config.single_solve_timeout,
                    request,
                    cancel,
                )
                .await?;
            return Ok(OptimizationResult {
                strategy: ClusterStrategy::Single,
                clusters: vec![outcome],
                excluded,
                rejected_vehicles,
            });
        }

        let plan = plan_clusters(&valid, vehicles.len(), self.config.cluster_radius_km);
        let shared_depot = if plan.clusters.len() == 1 {
            Some(self.depots.resolve(&valid, explicit, address).await?)
        } else {
            None
        };
        let assignments = assign_vehicles(&plan.clusters, &vehicles);

        info!(
            strategy = plan.strategy.as_str(),
            clusters = plan.clusters.len(),
            "Solving clusters"
        );

        let permits = Semaphore::new(self.config.max_parallel_clusters.max(1));
        let permits = &permits;
        let options = &options;
        let mut tasks = Vec::with_capacity(plan.clusters.len());
        for (cluster, vehicles) in plan.clusters.iter().zip(&assignments) {
            let depot = shared_depot.unwrap_or(Depot::new(cluster.centroid, DepotSource::ClusterCentroid));
            tasks.push(async move {
                let _permit = permits.acquire().await.ok();
                self.solve_cluster(
                    cluster,
                    depot,
                    vehicles,
                    options,
                    self.config.cluster_solve_timeout,
                    request,
                    cancel,
                )
                .await
            });
        }

        let clusters = join_all(tasks).await.into_iter().collect::<Result<Vec<_>, _>>()?;

        Ok(OptimizationResult {
            strategy: plan.strategy,
            clusters,
            excluded,
            rejected_vehicles,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn solve_cluster(
        &self,
        cluster: &Cluster,
        depot: Depot,
        vehicles: &[VehicleConfig],
        options: &ProblemOptions,
        timeout: Duration,
        request: &OptimizeRequest,
        cancel: &CancellationToken,
    ) -> Result<ClusterOutcome, OptimizeError> {
        let outcome = match self.remote_attempt(cluster, depot, vehicles, options, timeout, request, cancel).await {
            Ok(outcome) => outcome,
            Err(DegradeReason::Remote(e)) if !e.is_recoverable() => {
                warn!(cluster_id = %cluster.id, kind = e.kind(), error = %e, "Solver rejected the problem");
                return Err(OptimizeError::Rejected(e));
            }
            Err(reason) => {
                warn!(
                    cluster_id = %cluster.id,
                    kind = reason.kind(),
                    reason = %reason,
                    "Remote solve unavailable, using heuristic routes"
                );
                let tours = heuristic_split(&cluster.stops, vehicles, depot.location, request.use_two_opt);
                Outcome::Degraded { tours, reason }
            }
        };

        info!(
            cluster_id = %cluster.id,
            stops = cluster.stops.len(),
            tours = outcome.tours().len(),
            unassigned = outcome.unassigned().len(),
            degraded = outcome.is_degraded(),
            "Cluster solved"
        );

        Ok(ClusterOutcome {
            cluster_id: cluster.id.clone(),
            city: cluster.city.clone(),
            depot,
            stop_count: cluster.stops.len(),
            vehicle_ids: vehicles.iter().map(|v| v.id.clone()).collect(),
            outcome,
        })
    }

    /// Remote solve for one cluster. `Err` carries the reason to fall back.
    #[allow(clippy::too_many_arguments)]
    async fn remote_attempt(
        &self,
        cluster: &Cluster,
        depot: Depot,
        vehicles: &[VehicleConfig],
        options: &ProblemOptions,
        timeout: Duration,
        request: &OptimizeRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome, DegradeReason> {
        if cancel.is_cancelled() {
            return Err(DegradeReason::Cancelled);
        }

        let mut effective = timeout;
        let mut clipped = false;
        if let Some(deadline) = request.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DegradeReason::DeadlineExceeded);
            }
            if remaining < timeout {
                effective = remaining;
                clipped = true;
            }
        }

        let problem = build_problem(&cluster.stops, depot.location, vehicles, options);
        let solution = match self.client.solve(&problem, effective, cancel).await {
            Ok(solution) => solution,
            Err(SolverError::Timeout { .. }) if clipped => return Err(DegradeReason::DeadlineExceeded),
            Err(SolverError::Cancelled) => return Err(DegradeReason::Cancelled),
            Err(e) => return Err(DegradeReason::Remote(e)),
        };

        if solution.has_no_visits() {
            return Err(DegradeReason::EmptySolution);
        }

        let (tours, unassigned) = reconcile(solution, &cluster.stops);
        // tours naming only unknown jobs reconcile to nothing
        if tours.is_empty() {
            return Err(DegradeReason::EmptySolution);
        }
        Ok(Outcome::Solved { tours, unassigned })
    }
}
