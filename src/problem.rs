//! Problem builder: stops + depot + vehicles into a tour-planning problem document.
//!
//! The document follows the HERE Tour Planning v3 JSON layout:
//!
//! ```text
//! { "plan":  { "jobs":  [ { "id", "tasks": { "deliveries": [ { "places": [..], "demand": [n] } ] } } ] },
//!   "fleet": { "types": [ { "id", "profile", "costs", "shifts", "capacity", "amount" } ],
//!              "profiles": [ { "name": "car", "type": "car" } ] } }
//! ```
//!
//! Time windows are only attached under [`TimeWindowPolicy::Hard`]. Under the
//! default soft policy a job never carries `times`, and
//! [`ProblemDocument::strip_time_windows`] removes any that slipped in before
//! the document leaves the process.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{distance_km, Coord, Stop, VehicleConfig};
use crate::error::SolverError;

/// Shifts must last strictly longer than this.
pub const MIN_SHIFT_MINUTES: i64 = 30;

/// Default vehicle capacity.
pub const DEFAULT_CAPACITY: u32 = 9999;

/// Default service time at a stop, in seconds.
pub const DEFAULT_SERVICE_SECONDS: u32 = 300;

/// Routing profile shared by every vehicle type.
pub const PROFILE: &str = "car";

/// Whether job time windows are enforced by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindowPolicy {
    /// Windows are never sent; a bad window cannot make the problem infeasible.
    #[default]
    Soft,
    /// Well-formed windows are sent and enforced.
    Hard,
}

impl FromStr for TimeWindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(TimeWindowPolicy::Soft),
            "hard" => Ok(TimeWindowPolicy::Hard),
            other => Err(format!("unknown time window policy: {}", other)),
        }
    }
}

/// The full problem document sent to the solver service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDocument {
    pub plan: Plan,
    pub fleet: Fleet,
    /// Policy the document was built under; never serialized.
    #[serde(skip)]
    pub time_windows: TimeWindowPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub tasks: JobTasks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTasks {
    pub deliveries: Vec<JobTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTask {
    pub places: Vec<JobPlace>,
    pub demand: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPlace {
    pub location: Coord,
    /// Service duration in seconds.
    pub duration: u32,
    /// `[from, to]` pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<[DateTime<Utc>; 2]>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub types: Vec<VehicleType>,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: String,
    pub profile: String,
    pub costs: Costs,
    pub shifts: Vec<Shift>,
    pub capacity: Vec<u32>,
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Costs {
    pub fixed: f64,
    pub distance: f64,
    pub time: f64,
}

impl Default for Costs {
    fn default() -> Self {
        Self {
            fixed: 10.0,
            distance: 0.0004,
            time: 0.002,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub start: ShiftStart,
    pub end: ShiftEnd,
}

impl Shift {
    pub fn duration_minutes(&self) -> i64 {
        (self.end.time - self.start.time).num_minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftStart {
    pub time: DateTime<Utc>,
    pub location: Coord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftEnd {
    pub time: DateTime<Utc>,
    /// Omitted when the vehicle does not return to the depot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coord>,
}

impl ProblemDocument {
    pub fn job_count(&self) -> usize {
        self.plan.jobs.len()
    }

    /// First place of every job, keyed by job id.
    pub fn job_places(&self) -> HashMap<String, Coord> {
        self.plan
            .jobs
            .iter()
            .filter_map(|job| {
                let place = job.tasks.deliveries.first()?.places.first()?;
                Some((job.id.clone(), place.location))
            })
            .collect()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.plan.jobs.iter().map(|j| j.id.clone()).collect()
    }

    /// Removes time windows the solver must not see, returning the affected job ids.
    ///
    /// Under the soft policy every window goes. Under the hard policy only
    /// malformed ones (`from >= to`) are removed.
    pub fn strip_time_windows(&mut self) -> Vec<String> {
        let policy = self.time_windows;
        let mut stripped = Vec::new();

        for job in &mut self.plan.jobs {
            let mut touched = false;
            for task in &mut job.tasks.deliveries {
                for place in &mut task.places {
                    let Some(times) = place.times.as_mut() else {
                        continue;
                    };
                    let before = times.len();
                    match policy {
                        TimeWindowPolicy::Soft => times.clear(),
                        TimeWindowPolicy::Hard => times.retain(|[from, to]| from < to),
                    }
                    touched |= times.len() != before;
                    if times.is_empty() {
                        place.times = None;
                    }
                }
            }
            if touched {
                stripped.push(job.id.clone());
            }
        }

        if !stripped.is_empty() {
            warn!(
                jobs = ?stripped,
                policy = ?policy,
                "Stripped time windows before submission"
            );
        }
        stripped
    }

    /// Fails with [`SolverError::InvalidShift`] unless every shift exceeds [`MIN_SHIFT_MINUTES`].
    pub fn check_shifts(&self) -> Result<(), SolverError> {
        for vehicle in &self.fleet.types {
            for shift in &vehicle.shifts {
                let minutes = shift.duration_minutes();
                if minutes <= MIN_SHIFT_MINUTES {
                    return Err(SolverError::InvalidShift {
                        vehicle_id: vehicle.id.clone(),
                        minutes,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Knobs for [`build_problem`].
#[derive(Debug, Clone)]
pub struct ProblemOptions {
    pub default_capacity: u32,
    pub default_service_seconds: u32,
    /// Jobs farther than this from the depot are logged.
    pub max_depot_distance_km: f64,
    pub time_windows: TimeWindowPolicy,
    /// Day used for shifts that do not state their own times.
    pub service_date: NaiveDate,
    pub costs: Costs,
}

impl Default for ProblemOptions {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            default_service_seconds: DEFAULT_SERVICE_SECONDS,
            max_depot_distance_km: 80.0,
            time_windows: TimeWindowPolicy::Soft,
            service_date: Utc::now().date_naive(),
            costs: Costs::default(),
        }
    }
}

/// Shift window for a vehicle: its own times, or 00:00 to 23:59 UTC of the service day.
///
/// A missing end defaults to 23:59 on the start's day.
///
/// ```
/// use chrono::NaiveDate;
/// use route_optimizer::domain::VehicleConfig;
/// use route_optimizer::problem::resolve_shift;
///
/// let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
/// let (start, end) = resolve_shift(&VehicleConfig::new("v1"), day);
/// assert_eq!(start.to_rfc3339(), "2025-03-14T00:00:00+00:00");
/// assert_eq!((end - start).num_minutes(), 23 * 60 + 59);
/// ```
pub fn resolve_shift(vehicle: &VehicleConfig, service_date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = vehicle
        .shift_start
        .unwrap_or_else(|| service_date.and_time(NaiveTime::MIN).and_utc());
    let end = vehicle.shift_end.unwrap_or_else(|| {
        let last_minute = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN);
        start.date_naive().and_time(last_minute).and_utc()
    });
    (start, end)
}

fn delivery_task(stop: &Stop, location: Coord, options: &ProblemOptions) -> JobTask {
    let times = match options.time_windows {
        TimeWindowPolicy::Hard => stop.valid_time_window().map(|(from, to)| vec![[from, to]]),
        TimeWindowPolicy::Soft => None,
    };
    JobTask {
        places: vec![JobPlace {
            location,
            duration: stop.service_duration_secs(options.default_service_seconds),
            times,
        }],
        demand: vec![stop.demand()],
    }
}

fn vehicle_type(vehicle: &VehicleConfig, depot: Coord, options: &ProblemOptions) -> VehicleType {
    let (start, end) = resolve_shift(vehicle, options.service_date);
    VehicleType {
        id: vehicle.id.clone(),
        profile: PROFILE.to_string(),
        costs: options.costs,
        shifts: vec![Shift {
            start: ShiftStart {
                time: start,
                location: depot,
            },
            end: ShiftEnd {
                time: end,
                location: vehicle.return_to_depot.then_some(depot),
            },
        }],
        capacity: vec![vehicle.capacity_or(options.default_capacity)],
        amount: 1,
    }
}

/// Builds a problem document for the given stops and vehicles around one depot.
///
/// Stops without a valid coordinate are left out.
///
/// # Examples
///
/// ```
/// use route_optimizer::domain::{Coord, Stop, VehicleConfig};
/// use route_optimizer::problem::{build_problem, ProblemOptions};
///
/// let stops = vec![Stop::new("o1", Coord::new(45.42, -75.69)).with_quantity(2)];
/// let vehicles = vec![VehicleConfig::new("van-1")];
/// let doc = build_problem(&stops, Coord::new(45.40, -75.70), &vehicles, &ProblemOptions::default());
///
/// assert_eq!(doc.plan.jobs[0].tasks.deliveries[0].demand, vec![2]);
/// assert_eq!(doc.fleet.types[0].capacity, vec![9999]);
/// ```
pub fn build_problem(
    stops: &[Stop],
    depot: Coord,
    vehicles: &[VehicleConfig],
    options: &ProblemOptions,
) -> ProblemDocument {
    let mut jobs = Vec::with_capacity(stops.len());
    let mut far_jobs = Vec::new();

    for stop in stops {
        let Some(location) = stop.valid_location() else {
            debug!(stop_id = %stop.id, "Skipping stop without valid location");
            continue;
        };
        if distance_km(depot, location) > options.max_depot_distance_km {
            far_jobs.push(stop.id.clone());
        }
        jobs.push(Job {
            id: stop.id.clone(),
            tasks: JobTasks {
                deliveries: vec![delivery_task(stop, location, options)],
            },
        });
    }

    if !far_jobs.is_empty() {
        warn!(
            count = far_jobs.len(),
            max_km = options.max_depot_distance_km,
            jobs = ?far_jobs,
            "Jobs far from depot may be unassigned"
        );
    }

    let types: Vec<VehicleType> = vehicles.iter().map(|v| vehicle_type(v, depot, options)).collect();

    info!(
        jobs = jobs.len(),
        vehicles = types.len(),
        depot_lat = depot.lat,
        depot_lng = depot.lng,
        time_windows = ?options.time_windows,
        "Built problem"
    );

    ProblemDocument {
        plan: Plan { jobs },
        fleet: Fleet {
            types,
            profiles: vec![Profile {
                name: PROFILE.to_string(),
                kind: PROFILE.to_string(),
            }],
        },
        time_windows: options.time_windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn options() -> ProblemOptions {
        ProblemOptions {
            service_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            ..ProblemOptions::default()
        }
    }

    fn windowed_stop(id: &str) -> Stop {
        Stop::new(id, Coord::new(45.42, -75.69))
            .with_time_window(at("2025-01-06T09:00:00Z"), at("2025-01-06T11:00:00Z"))
    }

    #[test]
    fn test_job_shape_and_defaults() {
        let stops = vec![
            Stop::new("a", Coord::new(45.42, -75.69)),
            Stop::new("b", Coord::new(45.43, -75.68)).with_service_minutes(2).with_quantity(4),
        ];
        let doc = build_problem(&stops, Coord::new(45.4, -75.7), &[VehicleConfig::new("v1")], &options());
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(
            value["plan"]["jobs"][0],
            json!({
                "id": "a",
                "tasks": { "deliveries": [ {
                    "places": [ { "location": { "lat": 45.42, "lng": -75.69 }, "duration": 300 } ],
                    "demand": [1]
                } ] }
            })
        );
        assert_eq!(value["plan"]["jobs"][1]["tasks"]["deliveries"][0]["places"][0]["duration"], 120);
        assert_eq!(value["plan"]["jobs"][1]["tasks"]["deliveries"][0]["demand"], json!([4]));
        assert!(value.get("time_windows").is_none());
    }

    #[test]
    fn test_fleet_shape() {
        let vehicles = vec![
            VehicleConfig::new("v1").with_capacity(50),
            VehicleConfig::new("v2").with_return_to_depot(false),
        ];
        let depot = Coord::new(45.4, -75.7);
        let doc = build_problem(&[], depot, &vehicles, &options());
        let value = serde_json::to_value(&doc).unwrap();

        let v1 = &value["fleet"]["types"][0];
        assert_eq!(v1["id"], "v1");
        assert_eq!(v1["profile"], "car");
        assert_eq!(v1["capacity"], json!([50]));
        assert_eq!(v1["amount"], 1);
        assert_eq!(v1["costs"], json!({ "fixed": 10.0, "distance": 0.0004, "time": 0.002 }));
        assert_eq!(v1["shifts"][0]["start"]["time"], "2025-01-06T00:00:00Z");
        assert_eq!(v1["shifts"][0]["end"]["time"], "2025-01-06T23:59:00Z");
        assert_eq!(v1["shifts"][0]["end"]["location"], json!({ "lat": 45.4, "lng": -75.7 }));

        let v2 = &value["fleet"]["types"][1];
        assert_eq!(v2["capacity"], json!([9999]));
        assert!(v2["shifts"][0]["end"].get("location").is_none());

        assert_eq!(value["fleet"]["profiles"], json!([{ "name": "car", "type": "car" }]));
    }

    #[test]
    fn test_vehicle_shift_times_used() {
        let vehicle = VehicleConfig::new("v1").with_shift(at("2025-01-06T08:00:00Z"), at("2025-01-06T16:00:00Z"));
        let doc = build_problem(&[], Coord::new(45.4, -75.7), &[vehicle], &options());
        assert_eq!(doc.fleet.types[0].shifts[0].duration_minutes(), 8 * 60);
        assert!(doc.check_shifts().is_ok());
    }

    #[test]
    fn test_soft_policy_never_attaches_windows() {
        let doc = build_problem(&[windowed_stop("a")], Coord::new(45.4, -75.7), &[VehicleConfig::new("v")], &options());
        assert!(doc.plan.jobs[0].tasks.deliveries[0].places[0].times.is_none());
    }

    #[test]
    fn test_hard_policy_attaches_only_valid_windows() {
        let opts = ProblemOptions {
            time_windows: TimeWindowPolicy::Hard,
            ..options()
        };
        let backwards = Stop::new("b", Coord::new(45.42, -75.69))
            .with_time_window(at("2025-01-06T11:00:00Z"), at("2025-01-06T09:00:00Z"));
        let doc = build_problem(&[windowed_stop("a"), backwards], Coord::new(45.4, -75.7), &[VehicleConfig::new("v")], &opts);

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value["plan"]["jobs"][0]["tasks"]["deliveries"][0]["places"][0]["times"],
            json!([["2025-01-06T09:00:00Z", "2025-01-06T11:00:00Z"]])
        );
        assert!(doc.plan.jobs[1].tasks.deliveries[0].places[0].times.is_none());
    }

    #[test]
    fn test_strip_removes_stray_windows_under_soft() {
        let mut doc = build_problem(&[windowed_stop("a")], Coord::new(45.4, -75.7), &[VehicleConfig::new("v")], &options());
        doc.plan.jobs[0].tasks.deliveries[0].places[0].times =
            Some(vec![[at("2025-01-06T09:00:00Z"), at("2025-01-06T10:00:00Z")]]);

        assert_eq!(doc.strip_time_windows(), vec!["a".to_string()]);
        assert!(doc.plan.jobs[0].tasks.deliveries[0].places[0].times.is_none());
        assert!(doc.strip_time_windows().is_empty());
    }

    #[test]
    fn test_strip_keeps_valid_windows_under_hard() {
        let opts = ProblemOptions {
            time_windows: TimeWindowPolicy::Hard,
            ..options()
        };
        let mut doc = build_problem(&[windowed_stop("a"), windowed_stop("b")], Coord::new(45.4, -75.7), &[VehicleConfig::new("v")], &opts);
        doc.plan.jobs[1].tasks.deliveries[0].places[0].times =
            Some(vec![[at("2025-01-06T12:00:00Z"), at("2025-01-06T12:00:00Z")]]);

        assert_eq!(doc.strip_time_windows(), vec!["b".to_string()]);
        assert!(doc.plan.jobs[0].tasks.deliveries[0].places[0].times.is_some());
        assert!(doc.plan.jobs[1].tasks.deliveries[0].places[0].times.is_none());
    }

    #[test]
    fn test_short_shift_rejected() {
        let vehicle = VehicleConfig::new("v1").with_shift(at("2025-01-06T08:00:00Z"), at("2025-01-06T08:30:00Z"));
        let doc = build_problem(&[], Coord::new(45.4, -75.7), &[vehicle], &options());
        assert_eq!(
            doc.check_shifts(),
            Err(SolverError::InvalidShift {
                vehicle_id: "v1".into(),
                minutes: 30
            })
        );
    }

    #[test]
    fn test_invalid_stops_skipped_and_places_indexed() {
        let stops = vec![Stop::new("a", Coord::new(45.42, -75.69)), Stop::unlocated("ghost")];
        let doc = build_problem(&stops, Coord::new(45.4, -75.7), &[VehicleConfig::new("v")], &options());
        assert_eq!(doc.job_ids(), vec!["a".to_string()]);
        assert_eq!(doc.job_places().get("a"), Some(&Coord::new(45.42, -75.69)));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("Hard".parse::<TimeWindowPolicy>(), Ok(TimeWindowPolicy::Hard));
        assert_eq!(" soft ".parse::<TimeWindowPolicy>(), Ok(TimeWindowPolicy::Soft));
        assert!("strict".parse::<TimeWindowPolicy>().is_err());
    }
}
