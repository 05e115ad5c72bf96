//! Request handlers

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use super::extract::ApiJson;
use super::ApiState;
use crate::service::ServiceResult;
use crate::stats::wire::{
    Ack, ClearStatsRequest, FleetAggregateRequest, FleetAggregateResponse, QueryStatsRequest,
    QueryStatsResponse, ReportStatRequest, StatsSeriesRequest, StatsSeriesResponse,
};

pub(super) async fn health(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<Value>) {
    let status = state.service.health().await;

    if status.healthy {
        (
            StatusCode::OK,
            Json(json!({
                "status": "SERVING",
                "backend": status.backend_type,
                "latencyMs": status.latency.as_millis() as u64,
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "NOT_SERVING", "backend": status.backend_type })),
        )
    }
}

pub(super) async fn report_stat(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<ReportStatRequest>,
) -> ServiceResult<Json<Ack>> {
    state.service.report_stat(request).await.map(Json)
}

pub(super) async fn query_stats(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<QueryStatsRequest>,
) -> ServiceResult<Json<QueryStatsResponse>> {
    state.service.query_stats(request).await.map(Json)
}

pub(super) async fn query_fleet_aggregate(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<FleetAggregateRequest>,
) -> ServiceResult<Json<FleetAggregateResponse>> {
    state.service.query_fleet_aggregate(request).await.map(Json)
}

pub(super) async fn query_stats_series(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<StatsSeriesRequest>,
) -> ServiceResult<Json<StatsSeriesResponse>> {
    state.service.query_stats_series(request).await.map(Json)
}

pub(super) async fn clear_stats(
    State(state): State<Arc<ApiState>>,
    ApiJson(request): ApiJson<ClearStatsRequest>,
) -> ServiceResult<Json<Ack>> {
    state.service.clear_stats(request).await.map(Json)
}
