//! Persistence of stat records and grouped reads over them

use std::sync::Arc;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::error::{StorageError, StorageResult};
use super::executor::TransactionExecutor;
use super::traits::{HealthStatus, StatsBackend};
use crate::query;
use crate::stats::{AggregateResult, ClearFilter, Filter, NewStat, RecordId};

/// The store owning the `pipeline_stats` collection
///
/// Every operation runs as one transaction through [`TransactionExecutor`].
/// Constructed once at startup and shared behind an `Arc`.
pub struct AggregateStore {
    executor: TransactionExecutor,
    clock: Arc<dyn Clock>,
}

impl AggregateStore {
    pub fn new(backend: Arc<dyn StatsBackend>) -> Self {
        Self {
            executor: TransactionExecutor::new(backend),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used to stamp reports
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_type(&self) -> &'static str {
        self.executor.backend().backend_type()
    }

    /// Persist one report, stamped with the current server time
    pub async fn report(&self, stat: NewStat) -> StorageResult<RecordId> {
        let clock = Arc::clone(&self.clock);

        let (id, pipeline_id) = self
            .executor
            .run("report", move |session| {
                Box::pin(async move {
                    if stat.pipeline_id.trim().is_empty() {
                        return Err(StorageError::validation("pipeline id must not be empty"));
                    }
                    let timestamp = clock
                        .now_nanos()
                        .filter(|ts| *ts >= 0)
                        .ok_or_else(|| {
                            StorageError::validation("server time is outside the timestamp range")
                        })?;

                    let record = stat.at(timestamp);
                    let id = session.insert(&record).await?;
                    Ok((id, record.pipeline_id))
                })
            })
            .await?;

        info!(record_id = %id, pipeline_id = %pipeline_id, "inserted stat record");
        Ok(id)
    }

    /// Grouped aggregate per pipeline for a window
    ///
    /// Group order is unspecified.
    pub async fn query(&self, filter: &Filter) -> StorageResult<Vec<AggregateResult>> {
        let plan = query::stats_query(filter);

        let groups = self
            .executor
            .run("query", move |session| {
                Box::pin(async move { session.aggregate(&plan).await })
            })
            .await?;

        debug!(
            groups = groups.len(),
            ids = filter.ids.len(),
            from = filter.from_timestamp,
            to = filter.to_timestamp,
            include_constituents = filter.include_constituents,
            "queried pipeline stats"
        );
        Ok(groups)
    }

    /// Totals over every record ever written
    ///
    /// Yields one row when the collection holds any record, none otherwise.
    pub async fn query_fleet_aggregate(&self) -> StorageResult<Vec<AggregateResult>> {
        let plan = query::fleet_aggregate_query();

        self.executor
            .run("query_fleet_aggregate", move |session| {
                Box::pin(async move { session.aggregate(&plan).await })
            })
            .await
    }

    /// Delete every record matching the filter in one bulk operation
    ///
    /// Returns the number of deleted records; repeating a clear deletes zero.
    pub async fn clear(&self, filter: &ClearFilter) -> StorageResult<u64> {
        let delete = query::clear_filter(filter);

        let deleted = self
            .executor
            .run("clear", move |session| {
                Box::pin(async move { session.delete_many(&delete).await })
            })
            .await?;

        info!(
            deleted,
            ids = filter.ids.len(),
            from = filter.from_timestamp,
            to = filter.to_timestamp,
            "cleared pipeline stats"
        );
        Ok(deleted)
    }

    pub async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.executor.backend().health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::MemoryBackend;
    use crate::storage::clock::ManualClock;

    fn store_with_clock(start: i64) -> (AggregateStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(start, 1));
        let store = AggregateStore::new(Arc::new(MemoryBackend::new())).with_clock(clock.clone());
        (store, clock)
    }

    fn stat(id: &str, records: i64) -> NewStat {
        NewStat {
            pipeline_id: id.to_string(),
            records_handled: records,
            ..Default::default()
        }
    }

    fn everything(include_constituents: bool) -> Filter {
        Filter {
            to_timestamp: i64::MAX,
            include_constituents,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_report_stamps_server_time() {
        let (store, _clock) = store_with_clock(1_000);
        store.report(stat("a", 1)).await.unwrap();

        let groups = store.query(&everything(true)).await.unwrap();
        let constituents = groups[0].constituents.as_ref().unwrap();
        assert_eq!(constituents[0].timestamp, 1_000);
    }

    #[tokio::test]
    async fn test_report_rejects_empty_pipeline_id() {
        let (store, _clock) = store_with_clock(0);
        let err = store.report(stat("  ", 1)).await.unwrap_err();

        assert!(err.is_aborted());
        assert!(matches!(err.root(), StorageError::Validation(_)));
        assert!(store.query_fleet_aggregate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_rejects_negative_clock() {
        let (store, _clock) = store_with_clock(-5);
        let err = store.report(stat("a", 1)).await.unwrap_err();
        assert!(matches!(err.root(), StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fleet_aggregate_on_empty_store() {
        let (store, _clock) = store_with_clock(0);
        assert!(store.query_fleet_aggregate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, clock) = store_with_clock(10);
        store.report(stat("a", 1)).await.unwrap();
        store.report(stat("a", 2)).await.unwrap();
        store.report(stat("b", 3)).await.unwrap();

        let filter = ClearFilter {
            ids: ["a".to_string()].into_iter().collect(),
            from_timestamp: 0,
            to_timestamp: clock.peek(),
        };
        assert_eq!(store.clear(&filter).await.unwrap(), 2);
        assert_eq!(store.clear(&filter).await.unwrap(), 0);

        let groups = store.query(&everything(false)).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].pipeline_id.as_deref(), Some("b"));
    }
}
