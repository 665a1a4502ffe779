//! Converters between domain models and DTOs.

use std::time::Duration;

use tokio::time::Instant;

use crate::demo_data::DemoDataset;
use crate::domain::{Coord, Stop, UnassignedJob, VehicleConfig};
use crate::dto::{
    ClusterDto, OptimizationRequestDto, OptimizationResultDto, RejectedVehicleDto, RouteDto, RoutePlanDto,
    StopDto, UnassignedDto, UnassignedReasonDto, VehicleDto,
};
use crate::orchestrator::{ClusterOutcome, OptimizationResult, OptimizeRequest};
use crate::service::OptimizationJob;

fn to_coord(pair: [f64; 2]) -> Coord {
    Coord::new(pair[0], pair[1])
}

fn to_pair(coord: Coord) -> [f64; 2] {
    [coord.lat, coord.lng]
}

impl StopDto {
    pub fn to_domain(&self) -> Stop {
        Stop {
            id: self.id.clone(),
            location: self.location.map(to_coord),
            city: self.city.clone(),
            service_seconds: self.service_seconds,
            service_minutes: self.service_minutes,
            quantity: self.quantity,
            window_start: self.window_start,
            window_end: self.window_end,
        }
    }

    pub fn from_stop(stop: &Stop) -> Self {
        Self {
            id: stop.id.clone(),
            location: stop.location.map(to_pair),
            city: stop.city.clone(),
            quantity: stop.quantity,
            service_minutes: stop.service_minutes,
            service_seconds: stop.service_seconds,
            window_start: stop.window_start,
            window_end: stop.window_end,
        }
    }
}

impl VehicleDto {
    pub fn to_domain(&self) -> VehicleConfig {
        VehicleConfig {
            id: self.id.clone(),
            capacity: self.capacity,
            shift_start: self.shift_start,
            shift_end: self.shift_end,
            return_to_depot: self.return_to_depot.unwrap_or(true),
        }
    }

    pub fn from_vehicle(vehicle: &VehicleConfig) -> Self {
        Self {
            id: vehicle.id.clone(),
            capacity: vehicle.capacity,
            shift_start: vehicle.shift_start,
            shift_end: vehicle.shift_end,
            return_to_depot: Some(vehicle.return_to_depot),
        }
    }
}

impl OptimizationRequestDto {
    /// Domain request; `timeoutSeconds` becomes a deadline from now.
    /// A timeout too large to represent means no deadline.
    pub fn to_request(&self) -> OptimizeRequest {
        OptimizeRequest {
            stops: self.stops.iter().map(StopDto::to_domain).collect(),
            vehicles: self.vehicles.iter().map(VehicleDto::to_domain).collect(),
            depot: self.depot.map(to_coord),
            depot_address: self
                .depot_address
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            use_two_opt: self.use_two_opt,
            deadline: self
                .timeout_seconds
                .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs))),
        }
    }

    pub fn from_demo(data: &DemoDataset) -> Self {
        Self {
            name: data.name.clone(),
            stops: data.stops.iter().map(StopDto::from_stop).collect(),
            vehicles: data.vehicles.iter().map(VehicleDto::from_vehicle).collect(),
            depot: data.depot.map(to_pair),
            depot_address: None,
            use_two_opt: true,
            timeout_seconds: None,
        }
    }
}

impl UnassignedDto {
    pub fn from_job(job: &UnassignedJob) -> Self {
        Self {
            stop_id: job.job_id.clone(),
            reasons: job
                .reasons
                .iter()
                .map(|r| UnassignedReasonDto {
                    code: r.code.clone(),
                    description: r.description.clone(),
                })
                .collect(),
        }
    }
}

impl ClusterDto {
    pub fn from_outcome(cluster: &ClusterOutcome) -> Self {
        Self {
            id: cluster.cluster_id.clone(),
            city: cluster.city.clone(),
            depot: to_pair(cluster.depot.location),
            depot_source: cluster.depot.source.as_str().to_string(),
            stop_count: cluster.stop_count,
            vehicle_ids: cluster.vehicle_ids.clone(),
            outcome: if cluster.outcome.is_degraded() {
                "DEGRADED".to_string()
            } else {
                "SOLVED".to_string()
            },
            degrade_reason: cluster.outcome.degrade_reason().map(|r| r.to_string()),
            degrade_kind: cluster.outcome.degrade_reason().map(|r| r.kind().to_string()),
        }
    }
}

impl OptimizationResultDto {
    pub fn from_result(result: &OptimizationResult) -> Self {
        let routes = result
            .routes()
            .into_iter()
            .enumerate()
            .map(|(i, route)| RouteDto {
                name: route.display_name(i + 1),
                cluster_id: route.cluster_id,
                city: route.city,
                vehicle_id: route.tour.vehicle_id,
                stops: route.tour.stop_ids,
                distance_km: route.tour.distance_km,
                duration_seconds: route.tour.duration_secs,
                degraded: route.degraded,
            })
            .collect();

        Self {
            strategy: result.strategy.as_str().to_string(),
            routes,
            unassigned: result.unassigned().iter().map(UnassignedDto::from_job).collect(),
            excluded: result.excluded.clone(),
            clusters: result.clusters.iter().map(ClusterDto::from_outcome).collect(),
            rejected_vehicles: result
                .rejected_vehicles
                .iter()
                .map(|e| RejectedVehicleDto {
                    vehicle_id: e.vehicle_id().unwrap_or_default().to_string(),
                    reason: e.to_string(),
                })
                .collect(),
            degraded: result.is_degraded(),
        }
    }
}

impl RoutePlanDto {
    pub fn from_job(job: &OptimizationJob) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            status: job.status.as_str().to_string(),
            result: job.result.as_ref().map(OptimizationResultDto::from_result),
            error: job.error.clone(),
        }
    }
}
