//! Performance benchmarks for in-process aggregation

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use pipeline_stats::assembler::assemble_stats;
use pipeline_stats::query::{eval, stats_query};
use pipeline_stats::stats::{Filter, NewStat, StatRecord};
use pipeline_stats::storage::backends::MemoryBackend;
use pipeline_stats::storage::AggregateStore;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Records spread over `pipelines` ids with increasing timestamps
fn create_records(size: usize, pipelines: usize) -> Vec<StatRecord> {
    (0..size)
        .map(|i| {
            NewStat {
                pipeline_id: format!("pipeline-{}", i % pipelines),
                records_handled: i as i64,
                bytes_handled: (i * 64) as i64,
                num_errors: (i % 7 == 0) as i64,
                num_retries: (i % 11 == 0) as i64,
            }
            .at(i as i64)
        })
        .collect()
}

fn window(size: usize, include_constituents: bool) -> Filter {
    Filter {
        from_timestamp: (size / 4) as i64,
        to_timestamp: (size * 3 / 4) as i64,
        include_constituents,
        ..Default::default()
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(5));

    for size in [100, 1_000, 10_000].iter() {
        let records = create_records(*size, 16);
        for include in [false, true] {
            let query = stats_query(&window(*size, include));
            let name = if include { "with_constituents" } else { "totals_only" };
            group.bench_with_input(BenchmarkId::new(name, size), &records, |b, records| {
                b.iter(|| eval::evaluate(black_box(&query), black_box(records)).unwrap());
            });
        }
    }

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for pipelines in [1, 16, 256].iter() {
        let records = create_records(10_000, *pipelines);
        let groups = eval::evaluate(&stats_query(&window(10_000, true)), &records).unwrap();

        group.bench_with_input(BenchmarkId::new("assemble_stats", pipelines), &groups, |b, groups| {
            b.iter_batched(
                || groups.clone(),
                |groups| assemble_stats(groups, true),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_store_report(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("store");
    group.warm_up_time(Duration::from_secs(1));

    group.bench_function("report", |b| {
        let store = AggregateStore::new(Arc::new(MemoryBackend::new()));
        b.to_async(&rt).iter(|| async {
            store
                .report(NewStat {
                    pipeline_id: "bench".to_string(),
                    records_handled: 1,
                    ..Default::default()
                })
                .await
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_assemble, bench_store_report);
criterion_main!(benches);
