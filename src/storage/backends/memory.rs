//! In-memory transactional backend
//!
//! Sessions stage their writes privately. Reads inside a session see
//! committed records plus the session's own staged writes. `commit` applies
//! the staged writes under one write lock, so other sessions observe all of
//! them or none.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::query::{eval, AggregationQuery, DeleteFilter};
use crate::stats::{AggregateResult, RecordId, StatRecord};
use crate::storage::{
    error::StorageResult,
    traits::{HealthStatus, StatsBackend, StoreSession},
};

type Rows = Vec<(u64, StatRecord)>;

/// In-memory storage backend
#[derive(Clone, Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<Rows>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl StatsBackend for MemoryBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn start_session(&self) -> StorageResult<Box<dyn StoreSession>> {
        Ok(Box::new(MemorySession {
            records: Arc::clone(&self.records),
            next_id: Arc::clone(&self.next_id),
            staged: Vec::new(),
        }))
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = Instant::now();
        let count = self.records.read().await.len();

        Ok(HealthStatus {
            healthy: true,
            backend_type: "memory".to_string(),
            latency: start.elapsed(),
            details: HashMap::from([("records".to_string(), count.to_string())]),
        })
    }
}

enum StagedWrite {
    Insert(u64, StatRecord),
    Delete(HashSet<u64>),
}

struct MemorySession {
    records: Arc<RwLock<Rows>>,
    next_id: Arc<AtomicU64>,
    staged: Vec<StagedWrite>,
}

impl MemorySession {
    /// Committed rows with this session's staged writes applied
    async fn view(&self) -> Rows {
        let mut rows = self.records.read().await.clone();
        apply(&mut rows, &self.staged);
        rows
    }
}

fn apply(rows: &mut Rows, staged: &[StagedWrite]) {
    for write in staged {
        match write {
            StagedWrite::Insert(id, record) => rows.push((*id, record.clone())),
            StagedWrite::Delete(ids) => rows.retain(|(id, _)| !ids.contains(id)),
        }
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn insert(&mut self, record: &StatRecord) -> StorageResult<RecordId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.staged.push(StagedWrite::Insert(id, record.clone()));
        Ok(RecordId(id.to_string()))
    }

    async fn aggregate(&mut self, query: &AggregationQuery) -> StorageResult<Vec<AggregateResult>> {
        let records: Vec<StatRecord> = self.view().await.into_iter().map(|(_, r)| r).collect();
        Ok(eval::evaluate(query, &records)?)
    }

    async fn delete_many(&mut self, filter: &DeleteFilter) -> StorageResult<u64> {
        let matched: HashSet<u64> = self
            .view()
            .await
            .into_iter()
            .filter(|(_, record)| filter.matches(record))
            .map(|(id, _)| id)
            .collect();

        let deleted = matched.len() as u64;
        if deleted > 0 {
            self.staged.push(StagedWrite::Delete(matched));
        }
        Ok(deleted)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let mut rows = self.records.write().await;
        apply(&mut rows, &self.staged);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{clear_filter, fleet_aggregate_query};
    use crate::stats::{ClearFilter, NewStat};

    fn stat(id: &str, ts: i64) -> StatRecord {
        NewStat {
            pipeline_id: id.to_string(),
            records_handled: 1,
            ..Default::default()
        }
        .at(ts)
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_private() {
        let backend = MemoryBackend::new();
        let mut writer = backend.start_session().await.unwrap();
        writer.insert(&stat("a", 1)).await.unwrap();

        let mut reader = backend.start_session().await.unwrap();
        let seen = reader.aggregate(&fleet_aggregate_query()).await.unwrap();
        assert!(seen.is_empty());

        let own = writer.aggregate(&fleet_aggregate_query()).await.unwrap();
        assert_eq!(own[0].total_records_handled, 1);

        writer.commit().await.unwrap();
        assert_eq!(backend.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_abort_discards_staged_writes() {
        let backend = MemoryBackend::new();
        let mut session = backend.start_session().await.unwrap();
        session.insert(&stat("a", 1)).await.unwrap();
        session.abort().await.unwrap();

        assert_eq!(backend.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_session_discards_staged_writes() {
        let backend = MemoryBackend::new();
        {
            let mut session = backend.start_session().await.unwrap();
            session.insert(&stat("a", 1)).await.unwrap();
        }
        assert_eq!(backend.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_sees_own_inserts() {
        let backend = MemoryBackend::new();
        let mut session = backend.start_session().await.unwrap();
        session.insert(&stat("a", 5)).await.unwrap();
        session.insert(&stat("a", 50)).await.unwrap();

        let deleted = session
            .delete_many(&clear_filter(&ClearFilter {
                ids: ["a".to_string()].into_iter().collect(),
                from_timestamp: 0,
                to_timestamp: 10,
            }))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        session.commit().await.unwrap();
        assert_eq!(backend.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_record_ids_are_unique_across_sessions() {
        let backend = MemoryBackend::new();
        let mut first = backend.start_session().await.unwrap();
        let mut second = backend.start_session().await.unwrap();

        let a = first.insert(&stat("a", 1)).await.unwrap();
        let b = second.insert(&stat("b", 1)).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_health_check_reports_record_count() {
        let backend = MemoryBackend::new();
        let health = backend.health_check().await.unwrap();

        assert!(health.healthy);
        assert_eq!(health.backend_type, "memory");
        assert_eq!(health.details.get("records").map(String::as_str), Some("0"));
    }
}
