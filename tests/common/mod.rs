//! Common test utilities and helpers

#![allow(dead_code)]

use pipeline_stats::stats::wire::ReportStatRequest;
use pipeline_stats::stats::NewStat;
use pipeline_stats::storage::backends::MemoryBackend;
use pipeline_stats::storage::{AggregateStore, ManualClock};
use pipeline_stats::StatsService;
use std::sync::Arc;

/// Store over a fresh memory backend with a clock starting at `start`
/// that advances by one nanosecond per report
pub fn store_at(start: i64) -> (Arc<AggregateStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(start, 1));
    let store = AggregateStore::new(Arc::new(MemoryBackend::new())).with_clock(clock.clone());
    (Arc::new(store), clock)
}

pub fn service_at(start: i64) -> (StatsService, Arc<ManualClock>) {
    let (store, clock) = store_at(start);
    (StatsService::new(store, "test"), clock)
}

pub fn stat(id: &str, records: i64, bytes: i64, errors: i64, retries: i64) -> NewStat {
    NewStat {
        pipeline_id: id.to_string(),
        records_handled: records,
        bytes_handled: bytes,
        num_errors: errors,
        num_retries: retries,
    }
}

pub fn report(id: &str, records: i64, bytes: i64, errors: i64, retries: i64) -> ReportStatRequest {
    ReportStatRequest {
        pipeline_id: id.to_string(),
        records_handled: records,
        bytes_handled: bytes,
        num_errors: errors,
        num_retries: retries,
    }
}

/// Reports for pipelines `a` (3 reports) and `b` (2 reports)
pub fn two_pipeline_reports() -> Vec<NewStat> {
    vec![
        stat("a", 10, 1, 0, 0),
        stat("a", 20, 2, 0, 0),
        stat("a", 30, 3, 0, 0),
        stat("b", 5, 1, 1, 0),
        stat("b", 5, 1, 0, 1),
    ]
}
