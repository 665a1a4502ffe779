//! REST API for delivery route optimization.
//!
//! Provides endpoints for:
//! - Demo data retrieval
//! - Background optimization jobs (create, get, status, cancel)
//! - Synchronous optimization
//! - Swagger UI at /q/swagger-ui

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::demo_data::{available_datasets, generate_by_name};
use crate::dto::{
    ClusterDto, ErrorResponse, HealthResponse, InfoResponse, OptimizationRequestDto,
    OptimizationResultDto, RejectedVehicleDto, RouteDto, RoutePlanDto, StatusResponse, StopDto, UnassignedDto,
    UnassignedReasonDto, VehicleDto,
};
use crate::service::{JobStatus, OptimizationService};

/// Application state shared across handlers.
pub struct AppState {
    pub service: OptimizationService,
    /// Credential mode reported by `/info` ("apikey", "oauth" or "none").
    pub auth_mode: &'static str,
}

impl AppState {
    pub fn new(service: OptimizationService, auth_mode: &'static str) -> Self {
        Self { service, auth_mode }
    }
}

/// Creates the API router with CORS and Swagger UI enabled.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{name}", get(get_demo_data))
        // Route plans
        .route("/route-plans", post(create_route_plan))
        .route("/route-plans", get(list_route_plans))
        .route("/route-plans/optimize", post(optimize_route_plan))
        .route("/route-plans/{id}", get(get_route_plan))
        .route("/route-plans/{id}/status", get(get_route_plan_status))
        .route("/route-plans/{id}", delete(cancel_route_plan))
        // Swagger UI at /q/swagger-ui (Quarkus-style path)
        .merge(SwaggerUi::new("/q/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health & Info
// ============================================================================

/// GET /health - Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

/// GET /info - Application info endpoint.
#[utoipa::path(
    get,
    path = "/info",
    responses((status = 200, description = "Application info", body = InfoResponse))
)]
async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Route Optimizer",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "HERE Tour Planning v3",
        auth_mode: state.auth_mode,
    })
}

// ============================================================================
// Demo Data
// ============================================================================

/// GET /demo-data - List available demo datasets.
#[utoipa::path(
    get,
    path = "/demo-data",
    responses((status = 200, description = "List of demo dataset names", body = Vec<String>))
)]
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(available_datasets().to_vec())
}

/// GET /demo-data/{name} - Get a specific demo dataset as an optimization request.
#[utoipa::path(
    get,
    path = "/demo-data/{name}",
    params(("name" = String, Path, description = "Demo dataset name")),
    responses(
        (status = 200, description = "Demo data retrieved", body = OptimizationRequestDto),
        (status = 404, description = "Dataset not found")
    )
)]
async fn get_demo_data(Path(name): Path<String>) -> Result<Json<OptimizationRequestDto>, StatusCode> {
    match generate_by_name(&name) {
        Some(data) => Ok(Json(OptimizationRequestDto::from_demo(&data))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// ============================================================================
// Route Plan Handlers
// ============================================================================

/// POST /route-plans - Start optimizing in the background.
#[utoipa::path(
    post,
    path = "/route-plans",
    request_body = OptimizationRequestDto,
    responses((status = 200, description = "Job ID", body = String))
)]
async fn create_route_plan(
    State(state): State<Arc<AppState>>,
    Json(dto): Json<OptimizationRequestDto>,
) -> String {
    let id = Uuid::new_v4().to_string();
    let job = state.service.create_job(id.clone(), dto.name.clone());
    state.service.start(job, dto.to_request());
    id
}

/// GET /route-plans - List all route plan IDs.
#[utoipa::path(
    get,
    path = "/route-plans",
    responses((status = 200, description = "List of job IDs", body = Vec<String>))
)]
async fn list_route_plans(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.service.list_jobs())
}

/// GET /route-plans/{id} - Get job state and result.
#[utoipa::path(
    get,
    path = "/route-plans/{id}",
    params(("id" = String, Path, description = "Route plan ID")),
    responses(
        (status = 200, description = "Route plan retrieved", body = RoutePlanDto),
        (status = 404, description = "Not found")
    )
)]
async fn get_route_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoutePlanDto>, StatusCode> {
    match state.service.get_job(&id) {
        Some(job) => Ok(Json(RoutePlanDto::from_job(&job.read()))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /route-plans/{id}/status - Get job status only.
#[utoipa::path(
    get,
    path = "/route-plans/{id}/status",
    params(("id" = String, Path, description = "Route plan ID")),
    responses(
        (status = 200, description = "Status retrieved", body = StatusResponse),
        (status = 404, description = "Not found")
    )
)]
async fn get_route_plan_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, StatusCode> {
    match state.service.get_job(&id) {
        Some(job) => {
            let guard = job.read();
            Ok(Json(StatusResponse {
                id: guard.id.clone(),
                status: guard.status.as_str().to_string(),
                error: guard.error.clone(),
            }))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// DELETE /route-plans/{id} - Cancel a job and remove it.
#[utoipa::path(
    delete,
    path = "/route-plans/{id}",
    params(("id" = String, Path, description = "Route plan ID")),
    responses(
        (status = 200, description = "Job cancelled and removed", body = RoutePlanDto),
        (status = 404, description = "Not found")
    )
)]
async fn cancel_route_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoutePlanDto>, StatusCode> {
    state.service.cancel(&id);
    match state.service.remove_job(&id) {
        Some(job) => {
            let guard = job.read();
            let mut dto = RoutePlanDto::from_job(&guard);
            if guard.status == JobStatus::Solving {
                dto.status = JobStatus::Cancelled.as_str().to_string();
            }
            Ok(Json(dto))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /route-plans/optimize - Optimize and wait for the result.
#[utoipa::path(
    post,
    path = "/route-plans/optimize",
    request_body = OptimizationRequestDto,
    responses(
        (status = 200, description = "Routes computed", body = OptimizationResultDto),
        (status = 422, description = "No vehicles, no routable stops or an invalid shift", body = ErrorResponse)
    )
)]
async fn optimize_route_plan(
    State(state): State<Arc<AppState>>,
    Json(dto): Json<OptimizationRequestDto>,
) -> Result<Json<OptimizationResultDto>, (StatusCode, Json<ErrorResponse>)> {
    match state.service.optimize_now(dto.to_request()).await {
        Ok(result) => Ok(Json(OptimizationResultDto::from_result(&result))),
        Err(e) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse { error: e.to_string() }),
        )),
    }
}

// ============================================================================
// OpenAPI Documentation
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        info,
        list_demo_data,
        get_demo_data,
        create_route_plan,
        list_route_plans,
        get_route_plan,
        get_route_plan_status,
        cancel_route_plan,
        optimize_route_plan,
    ),
    components(schemas(
        HealthResponse,
        InfoResponse,
        StopDto,
        VehicleDto,
        OptimizationRequestDto,
        RouteDto,
        ClusterDto,
        RejectedVehicleDto,
        UnassignedDto,
        UnassignedReasonDto,
        OptimizationResultDto,
        RoutePlanDto,
        StatusResponse,
        ErrorResponse,
    ))
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::depot::NoGeocoder;
    use crate::orchestrator::RouteOrchestrator;
    use crate::tour_planning::tests::MockTransport;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn router(transport: MockTransport) -> Router {
        let orchestrator = RouteOrchestrator::new(transport, NoGeocoder, OptimizerConfig::default());
        let service = OptimizationService::new(Arc::new(orchestrator));
        create_router(AppState::new(service, "apikey"))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn small_request(vehicles: Value) -> Value {
        json!({
            "name": "Test",
            "stops": [
                { "id": "a", "location": [45.42, -75.69] },
                { "id": "b", "location": [45.41, -75.70] },
                { "id": "c", "location": [45.43, -75.68] },
                { "id": "lost" }
            ],
            "vehicles": vehicles
        })
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let app = router(MockTransport::solving_all_but(&[]));
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["status"], "UP");

        let (_, body) = send(&app, Method::GET, "/info", None).await;
        let info: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(info["authMode"], "apikey");
    }

    #[tokio::test]
    async fn test_demo_data() {
        let app = router(MockTransport::solving_all_but(&[]));
        let (_, body) = send(&app, Method::GET, "/demo-data", None).await;
        let names: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(names, vec!["OTTAWA", "OTTAWA_KINGSTON"]);

        let (status, body) = send(&app, Method::GET, "/demo-data/OTTAWA", None).await;
        assert_eq!(status, StatusCode::OK);
        let demo: OptimizationRequestDto = serde_json::from_slice(&body).unwrap();
        assert_eq!(demo.stops.len(), 30);

        let (status, _) = send(&app, Method::GET, "/demo-data/ATLANTIS", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimize_sync() {
        let app = router(MockTransport::solving_all_but(&["b"]));
        let (status, body) = send(
            &app,
            Method::POST,
            "/route-plans/optimize",
            Some(small_request(json!([{ "id": "v1" }]))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let result: OptimizationResultDto = serde_json::from_slice(&body).unwrap();
        assert_eq!(result.strategy, "single");
        assert!(!result.degraded);
        assert_eq!(result.routes[0].stops, vec!["a", "c"]);
        assert_eq!(result.unassigned[0].stop_id, "b");
        assert_eq!(result.excluded, vec!["lost"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimize_sync_rejects_no_vehicles() {
        let app = router(MockTransport::solving_all_but(&[]));
        let (status, body) = send(&app, Method::POST, "/route-plans/optimize", Some(small_request(json!([])))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "No vehicles supplied");
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_job_lifecycle() {
        let app = router(MockTransport::fixed(500, "down"));
        let (status, body) = send(
            &app,
            Method::POST,
            "/route-plans",
            Some(small_request(json!([{ "id": "v1" }]))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = String::from_utf8(body).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let (_, body) = send(&app, Method::GET, "/route-plans", None).await;
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(ids, vec![id.clone()]);

        let (_, body) = send(&app, Method::GET, &format!("/route-plans/{}/status", id), None).await;
        let status: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["status"], "COMPLETED");

        let (_, body) = send(&app, Method::GET, &format!("/route-plans/{}", id), None).await;
        let plan: RoutePlanDto = serde_json::from_slice(&body).unwrap();
        let result = plan.result.unwrap();
        assert!(result.degraded);
        assert_eq!(result.routes[0].stops.len(), 3);

        let (status, _) = send(&app, Method::DELETE, &format!("/route-plans/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, &format!("/route-plans/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_cancels_running_job() {
        let app = router(MockTransport::fixed(202, r#"{"id":"slow"}"#));
        let (_, body) = send(
            &app,
            Method::POST,
            "/route-plans",
            Some(small_request(json!([{ "id": "v1" }]))),
        )
        .await;
        let id = String::from_utf8(body).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let (_, body) = send(&app, Method::GET, &format!("/route-plans/{}/status", id), None).await;
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap()["status"], "SOLVING");

        let (status, body) = send(&app, Method::DELETE, &format!("/route-plans/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let plan: RoutePlanDto = serde_json::from_slice(&body).unwrap();
        assert_eq!(plan.status, "CANCELLED");
    }

    #[test]
    fn test_openapi_lists_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/route-plans/optimize"));
        assert!(doc.paths.paths.contains_key("/route-plans/{id}/status"));
    }
}
