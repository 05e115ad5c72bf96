//! Typed intermediate representation for grouping and delete queries
//!
//! A query is an ordered list of stages. A [`Stage::Match`] keeps the records
//! satisfying every one of its predicates; a [`Stage::Group`] folds the
//! surviving records into one [`crate::stats::AggregateResult`] per key.
//! Backends translate this tree into their own query language
//! (aggregation-pipeline documents, SQL) or evaluate it in process
//! ([`eval`]).

pub mod builder;
pub mod eval;

pub use builder::{clear_filter, fleet_aggregate_query, stats_query};

use thiserror::Error;

/// Stored fields of a stat record that queries can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PipelineId,
    Timestamp,
    RecordsHandled,
    BytesHandled,
    NumErrors,
    NumRetries,
}

impl Field {
    /// Name of the field in the stored document / table column
    pub fn storage_name(self) -> &'static str {
        match self {
            Field::PipelineId => "pipeline_id",
            Field::Timestamp => "timestamp",
            Field::RecordsHandled => "records_handled",
            Field::BytesHandled => "bytes_handled",
            Field::NumErrors => "num_errors",
            Field::NumRetries => "num_retries",
        }
    }
}

/// Output fields produced by summing accumulators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TotalField {
    RecordsHandled,
    BytesHandled,
    NumErrors,
    NumRetries,
}

impl TotalField {
    pub const ALL: [TotalField; 4] = [
        TotalField::RecordsHandled,
        TotalField::BytesHandled,
        TotalField::NumErrors,
        TotalField::NumRetries,
    ];

    pub fn storage_name(self) -> &'static str {
        match self {
            TotalField::RecordsHandled => "total_records_handled",
            TotalField::BytesHandled => "total_bytes_handled",
            TotalField::NumErrors => "total_num_errors",
            TotalField::NumRetries => "total_num_retries",
        }
    }

    /// The record field this total is summed from
    pub fn source(self) -> Field {
        match self {
            TotalField::RecordsHandled => Field::RecordsHandled,
            TotalField::BytesHandled => Field::BytesHandled,
            TotalField::NumErrors => Field::NumErrors,
            TotalField::NumRetries => Field::NumRetries,
        }
    }
}

/// Name of the grouped output field holding constituent records
pub const CONSTITUENTS_FIELD: &str = "stats";

/// A single boolean test against one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `from <= field <= to`
    Between { field: Field, from: i64, to: i64 },
    /// `field` equals one of `values`; an empty list matches nothing
    In { field: Field, values: Vec<String> },
}

/// Conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStage {
    pub predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// One group per distinct value of the field
    Field(Field),
    /// A single group over every input record
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
    Sum(TotalField),
    /// Collect each grouped record, in input order, under [`CONSTITUENTS_FIELD`]
    PushRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStage {
    pub key: GroupKey,
    pub accumulators: Vec<Accumulator>,
}

impl GroupStage {
    pub fn collects_constituents(&self) -> bool {
        self.accumulators.contains(&Accumulator::PushRecord)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Match(MatchStage),
    Group(GroupStage),
}

/// Ordered list of stages ending in exactly one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationQuery {
    pub stages: Vec<Stage>,
}

impl AggregationQuery {
    /// Split into the leading match predicates and the terminal group
    ///
    /// Multiple match stages are flattened into one conjunction.
    pub fn split(&self) -> Result<(Vec<&Predicate>, &GroupStage), QueryError> {
        let mut predicates = Vec::new();
        let mut group = None;

        for stage in &self.stages {
            match (stage, group) {
                (Stage::Match(m), None) => predicates.extend(m.predicates.iter()),
                (Stage::Group(g), None) => group = Some(g),
                (_, Some(_)) => return Err(QueryError::StageAfterGroup),
            }
        }

        group
            .map(|g| (predicates, g))
            .ok_or(QueryError::MissingGroup)
    }
}

/// Conjunctive filter for bulk deletes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteFilter {
    pub predicates: Vec<Predicate>,
}

/// Structural problems with a query tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("aggregation query has no group stage")]
    MissingGroup,

    #[error("stages after the group stage are not supported")]
    StageAfterGroup,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Stage {
        Stage::Group(GroupStage {
            key: GroupKey::All,
            accumulators: vec![Accumulator::Sum(TotalField::NumErrors)],
        })
    }

    fn window(from: i64, to: i64) -> Stage {
        Stage::Match(MatchStage {
            predicates: vec![Predicate::Between {
                field: Field::Timestamp,
                from,
                to,
            }],
        })
    }

    #[test]
    fn test_split_flattens_match_stages() {
        let query = AggregationQuery {
            stages: vec![window(0, 10), window(5, 20), group()],
        };
        let (predicates, group) = query.split().unwrap();
        assert_eq!(predicates.len(), 2);
        assert_eq!(group.key, GroupKey::All);
    }

    #[test]
    fn test_split_requires_group() {
        let query = AggregationQuery {
            stages: vec![window(0, 10)],
        };
        assert_eq!(query.split().unwrap_err(), QueryError::MissingGroup);
    }

    #[test]
    fn test_split_rejects_trailing_stages() {
        let query = AggregationQuery {
            stages: vec![group(), window(0, 10)],
        };
        assert_eq!(query.split().unwrap_err(), QueryError::StageAfterGroup);
    }

    #[test]
    fn test_total_fields_map_to_sources() {
        for total in TotalField::ALL {
            let source = total.source().storage_name();
            assert_eq!(total.storage_name(), format!("total_{}", source));
        }
    }
}
