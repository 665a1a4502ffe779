//! DTOs for REST API requests/responses.
//!
//! Locations are `[latitude, longitude]` arrays. Times are RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A delivery stop.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StopDto {
    /// Unique stop identifier.
    pub id: String,
    /// Location as `[latitude, longitude]`; missing when geocoding failed.
    #[serde(default)]
    pub location: Option<[f64; 2]>,
    /// City label used for clustering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Quantity demanded (default 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_minutes: Option<u32>,
    /// Takes precedence over `serviceMinutes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
}

/// A vehicle available for routing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    /// Unique vehicle identifier.
    pub id: String,
    /// Capacity (server default when missing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_end: Option<DateTime<Utc>>,
    /// Whether the route ends back at the depot (default true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to_depot: Option<bool>,
}

/// Everything needed to optimize routes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequestDto {
    /// Plan name.
    #[serde(default)]
    pub name: String,
    pub stops: Vec<StopDto>,
    pub vehicles: Vec<VehicleDto>,
    /// Explicit depot as `[latitude, longitude]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depot: Option<[f64; 2]>,
    /// Depot address to geocode when no explicit depot is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depot_address: Option<String>,
    /// Refine heuristic fallback routes with 2-opt.
    #[serde(default)]
    pub use_two_opt: bool,
    /// Overall deadline in seconds; unresolved clusters fall back when it passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// One reason a stop was not routed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnassignedReasonDto {
    pub code: String,
    pub description: String,
}

/// A stop the solver could not place.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedDto {
    pub stop_id: String,
    pub reasons: Vec<UnassignedReasonDto>,
}

/// One vehicle's route.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    /// Display name, e.g. "Ottawa - Route 1".
    pub name: String,
    pub cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub vehicle_id: String,
    /// Stop IDs in visiting order.
    pub stops: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    /// True when the route came from the local heuristic.
    pub degraded: bool,
}

/// Per-cluster summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Depot as `[latitude, longitude]`.
    pub depot: [f64; 2],
    /// How the depot was chosen ("explicit", "cluster-centroid", ...).
    pub depot_source: String,
    pub stop_count: usize,
    pub vehicle_ids: Vec<String>,
    /// "SOLVED" or "DEGRADED".
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrade_reason: Option<String>,
    /// Short cause of degradation ("http", "timeout", "empty-solution", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrade_kind: Option<String>,
}

/// A vehicle left out of the plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectedVehicleDto {
    pub vehicle_id: String,
    pub reason: String,
}

/// Result of an optimization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResultDto {
    /// Clustering strategy: "single", "city" or "proximity".
    pub strategy: String,
    pub routes: Vec<RouteDto>,
    pub unassigned: Vec<UnassignedDto>,
    /// Stops left out for lacking a valid coordinate.
    pub excluded: Vec<String>,
    pub clusters: Vec<ClusterDto>,
    /// Vehicles whose shift was too short to plan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_vehicles: Vec<RejectedVehicleDto>,
    /// True when any cluster fell back to the heuristic.
    pub degraded: bool,
}

/// A background optimization job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanDto {
    pub id: String,
    pub name: String,
    /// "SOLVING", "COMPLETED", "FAILED" or "CANCELLED".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OptimizationResultDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job status only.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error body for rejected optimizations.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status indicator ("UP" when healthy).
    pub status: &'static str,
}

/// Application info response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
    /// Credential mode: "apikey", "oauth" or "none".
    pub auth_mode: &'static str,
}
