//! Builders translating logical filters into query trees

use super::{
    Accumulator, AggregationQuery, DeleteFilter, Field, GroupKey, GroupStage, MatchStage,
    Predicate, Stage, TotalField,
};
use crate::stats::{ClearFilter, Filter};

/// Grouping query for a windowed, optionally id-restricted read
///
/// The time window is always present. The id predicate is appended only when
/// `filter.ids` is non-empty, so an empty set means every pipeline.
pub fn stats_query(filter: &Filter) -> AggregationQuery {
    let mut predicates = vec![timestamp_window(filter.from_timestamp, filter.to_timestamp)];
    if !filter.ids.is_empty() {
        predicates.push(pipeline_ids(filter.ids.iter().cloned().collect()));
    }

    let mut accumulators = sum_all_counters();
    if filter.include_constituents {
        accumulators.push(Accumulator::PushRecord);
    }

    AggregationQuery {
        stages: vec![
            Stage::Match(MatchStage { predicates }),
            Stage::Group(GroupStage {
                key: GroupKey::Field(Field::PipelineId),
                accumulators,
            }),
        ],
    }
}

/// Delete filter for a bulk clear
///
/// The id predicate is always present; an empty id set deletes nothing.
pub fn clear_filter(filter: &ClearFilter) -> DeleteFilter {
    DeleteFilter {
        predicates: vec![
            pipeline_ids(filter.ids.iter().cloned().collect()),
            timestamp_window(filter.from_timestamp, filter.to_timestamp),
        ],
    }
}

/// Unfiltered aggregate over every record ever written
///
/// Groups under a single key so the result has at most one row. Grouping by
/// pipeline id would give the same totals once summed; the constant key is
/// deliberate and lets `assemble_fleet` read the one row directly.
pub fn fleet_aggregate_query() -> AggregationQuery {
    AggregationQuery {
        stages: vec![Stage::Group(GroupStage {
            key: GroupKey::All,
            accumulators: sum_all_counters(),
        })],
    }
}

fn timestamp_window(from: i64, to: i64) -> Predicate {
    Predicate::Between {
        field: Field::Timestamp,
        from,
        to,
    }
}

fn pipeline_ids(values: Vec<String>) -> Predicate {
    Predicate::In {
        field: Field::PipelineId,
        values,
    }
}

fn sum_all_counters() -> Vec<Accumulator> {
    TotalField::ALL.into_iter().map(Accumulator::Sum).collect()
}
