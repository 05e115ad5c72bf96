//! # pipeline-stats
//!
//! Aggregation and persistence of per-pipeline throughput counters.
//!
//! A report is one submission of counters for a pipeline. Reports are
//! stamped with server time, persisted transactionally and later summed per
//! pipeline over an inclusive time window.
//!
//! ## Modules
//!
//! - `stats` - records, filters and the caller-facing wire shapes
//! - `query` - typed aggregation query trees and their in-process evaluator
//! - `storage` - transactional backends, the executor and the aggregate store
//! - `assembler` - reshapes grouped results into responses
//! - `service` - the stats operations and error collapse
//! - `api` - HTTP/JSON routes
//! - `app` - configuration, logging and startup
pub mod api;
pub mod app;
pub mod assembler;
pub mod query;
pub mod service;
pub mod stats;
pub mod storage;

pub use service::{ServiceError, StatsService};
pub use storage::{AggregateStore, StorageError, StorageResult};
