//! Core trait definitions for the storage layer
//!
//! A backend hands out [`StoreSession`]s. Each session owns one open
//! transaction: everything done through it becomes visible together on
//! [`StoreSession::commit`] or not at all. Dropping a session without
//! committing discards its work.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use super::error::StorageResult;
use crate::query::{AggregationQuery, DeleteFilter};
use crate::stats::{AggregateResult, RecordId, StatRecord};

/// A transactional document store holding stat records
#[async_trait]
pub trait StatsBackend: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_type(&self) -> &'static str;

    /// Start a session with an open transaction
    async fn start_session(&self) -> StorageResult<Box<dyn StoreSession>>;

    /// Check the health of the storage backend
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}

/// Operations available inside one transaction
#[async_trait]
pub trait StoreSession: Send {
    /// Insert one record, returning its store-assigned key
    async fn insert(&mut self, record: &StatRecord) -> StorageResult<RecordId>;

    /// Run a grouping query
    async fn aggregate(&mut self, query: &AggregationQuery) -> StorageResult<Vec<AggregateResult>>;

    /// Delete every record matching the filter, returning how many were removed
    async fn delete_many(&mut self, filter: &DeleteFilter) -> StorageResult<u64>;

    /// Make the session's work durable and visible
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discard the session's work
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

/// Result of a backend health probe
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub backend_type: String,
    pub latency: Duration,
    pub details: HashMap<String, String>,
}
