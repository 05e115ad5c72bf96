//! Pipeline statistics data model
//!
//! - `records` - storage-side shapes (what the store persists and groups)
//! - `wire` - caller-facing request/response shapes
//! - `int64_string` - serde adapter for decimal-string integers

pub mod int64_string;
pub mod records;
pub mod wire;

pub use records::{
    AggregateResult, ClearFilter, Filter, NewStat, RecordId, StatRecord, Totals,
    PIPELINE_STATS_COLLECTION,
};
