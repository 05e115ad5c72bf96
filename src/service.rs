//! The stats service: request shapes in, response shapes out
//!
//! Every storage failure collapses into one opaque [`ServiceError`]. The
//! cause is logged here and never returned to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::assembler::{assemble_fleet, assemble_stats};
use crate::stats::wire::{
    Ack, ClearStatsRequest, FleetAggregateRequest, FleetAggregateResponse, QueryStatsRequest,
    QueryStatsResponse, ReportStatRequest, StatsSeriesRequest, StatsSeriesResponse,
};
use crate::stats::{ClearFilter, Filter};
use crate::storage::{AggregateStore, HealthStatus, StorageError};

/// The only failure callers ever see
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("operation failed")]
    OperationFailed,
}

impl ServiceError {
    fn collapse(operation: &'static str, cause: StorageError) -> Self {
        error!(
            operation,
            error = %cause,
            root = %cause.root(),
            retryable = cause.is_retryable(),
            "stats operation failed"
        );
        ServiceError::OperationFailed
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Stats operations over a shared [`AggregateStore`]
#[derive(Clone)]
pub struct StatsService {
    store: Arc<AggregateStore>,
    namespace: String,
}

impl StatsService {
    pub fn new(store: Arc<AggregateStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    #[instrument(skip_all, fields(namespace = %self.namespace, pipeline_id = %request.pipeline_id))]
    pub async fn report_stat(&self, request: ReportStatRequest) -> ServiceResult<Ack> {
        self.store
            .report(request.into())
            .await
            .map(|_| Ack {})
            .map_err(|e| ServiceError::collapse("report", e))
    }

    #[instrument(skip_all, fields(namespace = %self.namespace))]
    pub async fn query_stats(&self, request: QueryStatsRequest) -> ServiceResult<QueryStatsResponse> {
        let filter = Filter::from(request);
        let groups = self
            .store
            .query(&filter)
            .await
            .map_err(|e| ServiceError::collapse("query", e))?;

        Ok(assemble_stats(groups, filter.include_constituents))
    }

    /// Totals across every record in the store
    ///
    /// The request's ids and window are not applied.
    #[instrument(skip_all, fields(namespace = %self.namespace))]
    pub async fn query_fleet_aggregate(
        &self,
        request: FleetAggregateRequest,
    ) -> ServiceResult<FleetAggregateResponse> {
        if !request.ids.is_empty() || request.from_timestamp != 0 || request.to_timestamp != 0 {
            debug!(
                ids = request.ids.len(),
                from = request.from_timestamp,
                to = request.to_timestamp,
                "fleet aggregate ignores ids and window"
            );
        }

        let groups = self
            .store
            .query_fleet_aggregate()
            .await
            .map_err(|e| ServiceError::collapse("query_fleet_aggregate", e))?;

        Ok(assemble_fleet(groups))
    }

    /// Time-bucketed series; not computed, always empty
    #[instrument(skip_all, fields(namespace = %self.namespace))]
    pub async fn query_stats_series(
        &self,
        request: StatsSeriesRequest,
    ) -> ServiceResult<StatsSeriesResponse> {
        debug!(
            ids = request.ids.len(),
            from = request.from_timestamp,
            to = request.to_timestamp,
            "stats series requested"
        );
        Ok(StatsSeriesResponse::default())
    }

    #[instrument(skip_all, fields(namespace = %self.namespace))]
    pub async fn clear_stats(&self, request: ClearStatsRequest) -> ServiceResult<Ack> {
        self.store
            .clear(&ClearFilter::from(request))
            .await
            .map(|_| Ack {})
            .map_err(|e| ServiceError::collapse("clear", e))
    }

    /// Backend health; a failing probe reports unhealthy rather than erroring
    pub async fn health(&self) -> HealthStatus {
        match self.store.health_check().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "health check failed");
                HealthStatus {
                    healthy: false,
                    backend_type: self.store.backend_type().to_string(),
                    latency: Default::default(),
                    details: [("error".to_string(), e.to_string())].into_iter().collect(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::MemoryBackend;
    use crate::storage::{ManualClock, StatsBackend, StoreSession};
    use async_trait::async_trait;

    fn service() -> StatsService {
        let store = AggregateStore::new(Arc::new(MemoryBackend::new()))
            .with_clock(Arc::new(ManualClock::starting_at(100, 1)));
        StatsService::new(Arc::new(store), "test")
    }

    struct Unreachable;

    #[async_trait]
    impl StatsBackend for Unreachable {
        fn backend_type(&self) -> &'static str {
            "unreachable"
        }

        async fn start_session(&self) -> crate::storage::StorageResult<Box<dyn StoreSession>> {
            Err(StorageError::connection("connection refused"))
        }

        async fn health_check(&self) -> crate::storage::StorageResult<HealthStatus> {
            Err(StorageError::connection("connection refused"))
        }
    }

    fn report(id: &str, records: i64) -> ReportStatRequest {
        ReportStatRequest {
            pipeline_id: id.to_string(),
            records_handled: records,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_report_then_query() {
        let service = service();
        service.report_stat(report("a", 4)).await.unwrap();
        service.report_stat(report("a", 6)).await.unwrap();

        let response = service
            .query_stats(QueryStatsRequest {
                to_timestamp: 1_000,
                include_stats: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.total_records_handled, 10);
        assert_eq!(response.stats["a"].stats.len(), 2);
    }

    #[tokio::test]
    async fn test_fleet_aggregate_ignores_window() {
        let service = service();
        service.report_stat(report("a", 4)).await.unwrap();

        let response = service
            .query_fleet_aggregate(FleetAggregateRequest {
                ids: vec!["other".to_string()],
                from_timestamp: 0,
                to_timestamp: 1,
            })
            .await
            .unwrap();
        assert_eq!(response.total_records_handled, 4);
    }

    #[tokio::test]
    async fn test_series_is_empty() {
        let response = service()
            .query_stats_series(StatsSeriesRequest::default())
            .await
            .unwrap();
        assert!(response.series.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_collapses() {
        let store = AggregateStore::new(Arc::new(Unreachable));
        let service = StatsService::new(Arc::new(store), "test");

        let err = service.report_stat(report("a", 1)).await.unwrap_err();
        assert_eq!(err.to_string(), "operation failed");

        let health = service.health().await;
        assert!(!health.healthy);
        assert_eq!(health.backend_type, "unreachable");
    }

    #[tokio::test]
    async fn test_empty_pipeline_id_collapses() {
        let err = service().report_stat(report("", 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::OperationFailed));
    }
}
