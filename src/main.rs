//! Delivery Route Optimizer - Axum Server

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use route_optimizer::api::{create_router, AppState};
use route_optimizer::auth::Credentials;
use route_optimizer::cache::TtlCache;
use route_optimizer::config::{OptimizerConfig, SolverEndpointConfig};
use route_optimizer::console;
use route_optimizer::geocoding::{CachedGeocoder, HereGeocoder};
use route_optimizer::orchestrator::RouteOrchestrator;
use route_optimizer::service::OptimizationService;
use route_optimizer::tour_planning::HttpTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("route_optimizer=info".parse()?))
        .init();

    console::print_banner();

    let config = OptimizerConfig::from_env()?;
    let endpoint = SolverEndpointConfig::from_env()?;

    let client = HttpTransport::default_client()?;
    let credentials = Credentials::from_endpoint(&endpoint, client.clone(), Arc::new(TtlCache::new()));
    let auth_mode = credentials.mode();
    let transport = HttpTransport::new(client, endpoint.base_url.clone(), credentials);

    let geocoder = CachedGeocoder::new(
        HereGeocoder::new(endpoint.geocode_url.clone(), endpoint.api_key.clone())?,
        Arc::new(TtlCache::new()),
    );

    let orchestrator = RouteOrchestrator::new(transport, geocoder, config);
    let service = OptimizationService::new(Arc::new(orchestrator));
    let app = create_router(AppState::new(service, auth_mode));

    let addr = SocketAddr::from(([0, 0, 0, 0], endpoint.port));
    println!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
