//! In-process evaluation of query trees over stored records
//!
//! Semantics mirror the document-store translation: `In` with no values
//! matches nothing, `Between` is inclusive on both ends, and groups collect
//! constituents in input order.

use super::{
    Accumulator, AggregationQuery, DeleteFilter, Field, GroupKey, Predicate, QueryError,
    TotalField,
};
use crate::stats::{AggregateResult, StatRecord};
use std::collections::BTreeMap;

impl Field {
    fn int_value(self, record: &StatRecord) -> Option<i64> {
        match self {
            Field::PipelineId => None,
            Field::Timestamp => Some(record.timestamp),
            Field::RecordsHandled => Some(record.records_handled),
            Field::BytesHandled => Some(record.bytes_handled),
            Field::NumErrors => Some(record.num_errors),
            Field::NumRetries => Some(record.num_retries),
        }
    }

    fn str_value(self, record: &StatRecord) -> Option<&str> {
        match self {
            Field::PipelineId => Some(&record.pipeline_id),
            _ => None,
        }
    }
}

impl Predicate {
    pub fn matches(&self, record: &StatRecord) -> bool {
        match self {
            Predicate::Between { field, from, to } => field
                .int_value(record)
                .is_some_and(|v| *from <= v && v <= *to),
            Predicate::In { field, values } => field
                .str_value(record)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
        }
    }
}

impl DeleteFilter {
    pub fn matches(&self, record: &StatRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}

/// Run `query` over `records`
///
/// Groups come back ordered by key; callers must not rely on that.
pub fn evaluate(
    query: &AggregationQuery,
    records: &[StatRecord],
) -> Result<Vec<AggregateResult>, QueryError> {
    let (predicates, group) = query.split()?;
    let collect = group.collects_constituents();

    let mut groups: BTreeMap<Option<String>, AggregateResult> = BTreeMap::new();

    for record in records
        .iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r)))
    {
        let key = match group.key {
            GroupKey::Field(field) => match field.str_value(record) {
                Some(v) => Some(v.to_string()),
                None => field.int_value(record).map(|v| v.to_string()),
            },
            GroupKey::All => None,
        };

        let entry = groups.entry(key.clone()).or_insert_with(|| AggregateResult {
            pipeline_id: key,
            total_records_handled: 0,
            total_bytes_handled: 0,
            total_num_errors: 0,
            total_num_retries: 0,
            constituents: collect.then(Vec::new),
        });

        for accumulator in &group.accumulators {
            match accumulator {
                Accumulator::Sum(total) => {
                    let value = total.source().int_value(record).unwrap_or_default();
                    let slot = total_slot(entry, *total);
                    *slot = slot.wrapping_add(value);
                }
                Accumulator::PushRecord => {
                    if let Some(constituents) = entry.constituents.as_mut() {
                        constituents.push(record.clone());
                    }
                }
            }
        }
    }

    Ok(groups.into_values().collect())
}

fn total_slot(result: &mut AggregateResult, total: TotalField) -> &mut i64 {
    match total {
        TotalField::RecordsHandled => &mut result.total_records_handled,
        TotalField::BytesHandled => &mut result.total_bytes_handled,
        TotalField::NumErrors => &mut result.total_num_errors,
        TotalField::NumRetries => &mut result.total_num_retries,
    }
}
