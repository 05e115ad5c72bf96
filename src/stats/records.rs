//! Storage-side record types
//!
//! These are the shapes persisted in, and read back from, the
//! `pipeline_stats` collection. Field names are snake_case to match the
//! stored documents; the caller-facing shapes live in [`super::wire`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Name of the collection (or table) holding one document per report
pub const PIPELINE_STATS_COLLECTION: &str = "pipeline_stats";

/// One report of incremental counters for a pipeline
///
/// `timestamp` is always assigned by the store at write time, in
/// nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    pub pipeline_id: String,
    pub timestamp: i64,
    pub records_handled: i64,
    pub bytes_handled: i64,
    pub num_errors: i64,
    pub num_retries: i64,
}

impl StatRecord {
    pub fn counters(&self) -> Totals {
        Totals {
            records_handled: self.records_handled,
            bytes_handled: self.bytes_handled,
            num_errors: self.num_errors,
            num_retries: self.num_retries,
        }
    }
}

/// Counters submitted by a caller; the store turns this into a [`StatRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStat {
    pub pipeline_id: String,
    pub records_handled: i64,
    pub bytes_handled: i64,
    pub num_errors: i64,
    pub num_retries: i64,
}

impl NewStat {
    pub fn at(self, timestamp: i64) -> StatRecord {
        StatRecord {
            pipeline_id: self.pipeline_id,
            timestamp,
            records_handled: self.records_handled,
            bytes_handled: self.bytes_handled,
            num_errors: self.num_errors,
            num_retries: self.num_retries,
        }
    }
}

/// Store-assigned primary key of a persisted record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element-wise sum of the four counters
///
/// Additions wrap rather than panic: counters are not validated on the way
/// in, so overflow is possible in principle and must not take the request
/// down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub records_handled: i64,
    pub bytes_handled: i64,
    pub num_errors: i64,
    pub num_retries: i64,
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals {
            records_handled: self.records_handled.wrapping_add(rhs.records_handled),
            bytes_handled: self.bytes_handled.wrapping_add(rhs.bytes_handled),
            num_errors: self.num_errors.wrapping_add(rhs.num_errors),
            num_retries: self.num_retries.wrapping_add(rhs.num_retries),
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        *self = *self + rhs;
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Totals>>(iter: I) -> Totals {
        iter.fold(Totals::default(), Add::add)
    }
}

/// One group of a grouping query
///
/// `pipeline_id` is `None` only for the fleet-wide group, which has no key.
/// `constituents` is `Some` exactly when the query asked for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub pipeline_id: Option<String>,
    pub total_records_handled: i64,
    pub total_bytes_handled: i64,
    pub total_num_errors: i64,
    pub total_num_retries: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constituents: Option<Vec<StatRecord>>,
}

impl AggregateResult {
    pub fn totals(&self) -> Totals {
        Totals {
            records_handled: self.total_records_handled,
            bytes_handled: self.total_bytes_handled,
            num_errors: self.total_num_errors,
            num_retries: self.total_num_retries,
        }
    }

    pub fn from_totals(pipeline_id: Option<String>, totals: Totals) -> Self {
        Self {
            pipeline_id,
            total_records_handled: totals.records_handled,
            total_bytes_handled: totals.bytes_handled,
            total_num_errors: totals.num_errors,
            total_num_retries: totals.num_retries,
            constituents: None,
        }
    }
}

/// Read-path filter
///
/// An empty `ids` set means "every pipeline". Both timestamp bounds are
/// inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub ids: BTreeSet<String>,
    pub from_timestamp: i64,
    pub to_timestamp: i64,
    pub include_constituents: bool,
}

/// Delete-path filter
///
/// Unlike [`Filter`], an empty `ids` set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearFilter {
    pub ids: BTreeSet<String>,
    pub from_timestamp: i64,
    pub to_timestamp: i64,
}
