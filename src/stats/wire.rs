//! Caller-facing request and response shapes
//!
//! Field names follow the protobuf JSON mapping of the stats API
//! (`pipelineId`, `includeStats`, ...). Every 64-bit integer is carried as a
//! decimal string. Absent fields take their zero value.

use super::int64_string;
use super::records::{ClearFilter, Filter, NewStat, StatRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportStatRequest {
    pub pipeline_id: String,
    #[serde(with = "int64_string")]
    pub records_handled: i64,
    #[serde(with = "int64_string")]
    pub bytes_handled: i64,
    #[serde(with = "int64_string")]
    pub num_errors: i64,
    #[serde(with = "int64_string")]
    pub num_retries: i64,
}

impl From<ReportStatRequest> for NewStat {
    fn from(req: ReportStatRequest) -> Self {
        NewStat {
            pipeline_id: req.pipeline_id,
            records_handled: req.records_handled,
            bytes_handled: req.bytes_handled,
            num_errors: req.num_errors,
            num_retries: req.num_retries,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryStatsRequest {
    pub ids: Vec<String>,
    #[serde(with = "int64_string")]
    pub from_timestamp: i64,
    #[serde(with = "int64_string")]
    pub to_timestamp: i64,
    pub include_stats: bool,
}

impl From<QueryStatsRequest> for Filter {
    fn from(req: QueryStatsRequest) -> Self {
        Filter {
            ids: req.ids.into_iter().collect(),
            from_timestamp: req.from_timestamp,
            to_timestamp: req.to_timestamp,
            include_constituents: req.include_stats,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryStatsResponse {
    #[serde(with = "int64_string")]
    pub total_records_handled: i64,
    #[serde(with = "int64_string")]
    pub total_bytes_handled: i64,
    #[serde(with = "int64_string")]
    pub total_num_errors: i64,
    #[serde(with = "int64_string")]
    pub total_num_retries: i64,
    pub stats: BTreeMap<String, PipelineAggregateStats>,
}

/// Per-pipeline entry of a [`QueryStatsResponse`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineAggregateStats {
    pub pipeline_id: String,
    #[serde(with = "int64_string")]
    pub total_records_handled: i64,
    #[serde(with = "int64_string")]
    pub total_bytes_handled: i64,
    #[serde(with = "int64_string")]
    pub total_num_errors: i64,
    #[serde(with = "int64_string")]
    pub total_num_retries: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stats: Vec<PipelineStat>,
}

/// One constituent report, as returned to callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineStat {
    pub pipeline_id: String,
    #[serde(with = "int64_string")]
    pub timestamp: i64,
    #[serde(with = "int64_string")]
    pub records_handled: i64,
    #[serde(with = "int64_string")]
    pub bytes_handled: i64,
    #[serde(with = "int64_string")]
    pub num_errors: i64,
    #[serde(with = "int64_string")]
    pub num_retries: i64,
}

impl From<StatRecord> for PipelineStat {
    fn from(record: StatRecord) -> Self {
        PipelineStat {
            pipeline_id: record.pipeline_id,
            timestamp: record.timestamp,
            records_handled: record.records_handled,
            bytes_handled: record.bytes_handled,
            num_errors: record.num_errors,
            num_retries: record.num_retries,
        }
    }
}

/// Fleet aggregate request
///
/// The window and ids are accepted but the fleet query scans the whole
/// collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetAggregateRequest {
    pub ids: Vec<String>,
    #[serde(with = "int64_string")]
    pub from_timestamp: i64,
    #[serde(with = "int64_string")]
    pub to_timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetAggregateResponse {
    #[serde(with = "int64_string")]
    pub total_records_handled: i64,
    #[serde(with = "int64_string")]
    pub total_bytes_handled: i64,
    #[serde(with = "int64_string")]
    pub total_num_errors: i64,
    #[serde(with = "int64_string")]
    pub total_num_retries: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClearStatsRequest {
    pub ids: Vec<String>,
    #[serde(with = "int64_string")]
    pub from_timestamp: i64,
    #[serde(with = "int64_string")]
    pub to_timestamp: i64,
}

impl From<ClearStatsRequest> for ClearFilter {
    fn from(req: ClearStatsRequest) -> Self {
        ClearFilter {
            ids: req.ids.into_iter().collect(),
            from_timestamp: req.from_timestamp,
            to_timestamp: req.to_timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsSeriesRequest {
    pub ids: Vec<String>,
    #[serde(with = "int64_string")]
    pub from_timestamp: i64,
    #[serde(with = "int64_string")]
    pub to_timestamp: i64,
}

/// Time-series response; always empty until continuous aggregation exists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsSeriesResponse {
    pub series: Vec<FleetAggregateResponse>,
}

/// Empty acknowledgement for write operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}
