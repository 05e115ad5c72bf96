//! HTTP/JSON surface for the stats service

mod extract;
mod handlers;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use extract::ApiJson;

use crate::service::StatsService;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub service: StatsService,
}

/// Build the API router
pub fn router(service: StatsService) -> Router {
    let shared_state = Arc::new(ApiState { service });

    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/v1alpha1/stats/report", post(handlers::report_stat))
        .route("/v1alpha1/stats/query", post(handlers::query_stats))
        .route("/v1alpha1/stats/aggregate", post(handlers::query_fleet_aggregate))
        .route("/v1alpha1/stats/series", post(handlers::query_stats_series))
        .route("/v1alpha1/stats/clear", post(handlers::clear_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, service: StatsService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting stats API server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Stats API server stopped");
    Ok(())
}
