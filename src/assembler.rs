//! Reshapes grouped aggregates into caller-facing responses
//!
//! Input group order is unspecified, so nothing here depends on it.

use std::collections::BTreeMap;

use crate::stats::wire::{FleetAggregateResponse, PipelineAggregateStats, PipelineStat, QueryStatsResponse};
use crate::stats::{AggregateResult, Totals};

/// Fold per-pipeline groups into a global total plus a per-pipeline map
///
/// Constituent records are carried over unmodified when
/// `include_constituents` is set and dropped otherwise. Two groups with the
/// same key are merged rather than one replacing the other.
pub fn assemble_stats(groups: Vec<AggregateResult>, include_constituents: bool) -> QueryStatsResponse {
    let global: Totals = groups.iter().map(AggregateResult::totals).sum();

    let mut stats: BTreeMap<String, PipelineAggregateStats> = BTreeMap::new();
    for group in groups {
        let totals = group.totals();
        let pipeline_id = group.pipeline_id.unwrap_or_default();

        let entry = stats
            .entry(pipeline_id.clone())
            .or_insert_with(|| PipelineAggregateStats {
                pipeline_id,
                ..Default::default()
            });

        let merged = entry_totals(entry) + totals;
        set_entry_totals(entry, merged);

        if include_constituents {
            entry.stats.extend(
                group
                    .constituents
                    .unwrap_or_default()
                    .into_iter()
                    .map(PipelineStat::from),
            );
        }
    }

    QueryStatsResponse {
        total_records_handled: global.records_handled,
        total_bytes_handled: global.bytes_handled,
        total_num_errors: global.num_errors,
        total_num_retries: global.num_retries,
        stats,
    }
}

/// Four fleet totals; zero when there are no rows
pub fn assemble_fleet(groups: Vec<AggregateResult>) -> FleetAggregateResponse {
    let totals: Totals = groups.iter().map(AggregateResult::totals).sum();

    FleetAggregateResponse {
        total_records_handled: totals.records_handled,
        total_bytes_handled: totals.bytes_handled,
        total_num_errors: totals.num_errors,
        total_num_retries: totals.num_retries,
    }
}

fn entry_totals(entry: &PipelineAggregateStats) -> Totals {
    Totals {
        records_handled: entry.total_records_handled,
        bytes_handled: entry.total_bytes_handled,
        num_errors: entry.total_num_errors,
        num_retries: entry.total_num_retries,
    }
}

fn set_entry_totals(entry: &mut PipelineAggregateStats, totals: Totals) {
    entry.total_records_handled = totals.records_handled;
    entry.total_bytes_handled = totals.bytes_handled;
    entry.total_num_errors = totals.num_errors;
    entry.total_num_retries = totals.num_retries;
}
