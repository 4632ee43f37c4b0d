#![allow(missing_docs)]

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use daymark_core::{DateInterval, Task, TaskId};
use daymark_store::{KeyedStore, has_conflict};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const ORIGIN: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

fn slot(offset_hours: i64) -> Option<DateInterval> {
    let start = ORIGIN + Duration::hours(offset_hours);
    DateInterval::between(start, start + Duration::minutes(45)).ok()
}

fn build_store(task_count: u64, slots_per_task: i64) -> KeyedStore {
    let mut store = KeyedStore::new();
    for n in 0..task_count {
        let first = i64::try_from(n).unwrap_or(i64::MAX / 2) * slots_per_task;
        let slots: Vec<DateInterval> = (0..slots_per_task).filter_map(|k| slot(first + k)).collect();
        if let Ok(task) = Task::new(format!("task {n}"), slots, ORIGIN) {
            store.put(TaskId(n), task);
        }
    }
    store
}

fn conflict_scan_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflict_scan");
    let candidate = slot(-10)
        .and_then(|free| Task::new("candidate", vec![free], ORIGIN).ok())
        .unwrap_or_else(|| panic!("benchmark candidate must be valid"));
    for &task_count in &[16u64, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(task_count), &task_count, |b, &count| {
            b.iter_batched(
                || build_store(count, 3),
                |store| {
                    black_box(has_conflict(&store, &candidate, None));
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, conflict_scan_benchmark);
criterion_main!(benches);
