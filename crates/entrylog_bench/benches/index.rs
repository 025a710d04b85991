//! Position index benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entrylog_bench::{locations, positions, runtime};
use entrylog_core::{EntryIndex, IndexConfig, LogIndex, MemoryIndex, Position};
use tempfile::TempDir;

/// Benchmark batched inserts into the RocksDB index.
fn bench_log_index_add_batch(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("log_index_add_batch");
    group.sample_size(30);

    for batch in [1usize, 64, 1024].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let temp_dir = TempDir::new().unwrap();
            let index = LogIndex::open(temp_dir.path(), IndexConfig::default()).unwrap();
            let locs = locations(batch, 256, 4096);
            let mut segment = 0i64;

            b.iter(|| {
                let entries: Vec<_> = positions(segment, batch)
                    .into_iter()
                    .zip(locs.iter().copied())
                    .collect();
                rt.block_on(index.add_batch(black_box(&entries))).unwrap();
                segment += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark point lookups in both index implementations.
fn bench_index_get(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("index_get");
    let count = 100_000;
    let entries: Vec<_> = positions(7, count)
        .into_iter()
        .zip(locations(count, 256, 4096))
        .collect();

    let temp_dir = TempDir::new().unwrap();
    let log_index = LogIndex::open(temp_dir.path(), IndexConfig::default()).unwrap();
    let memory_index = MemoryIndex::new();
    rt.block_on(async {
        log_index.add_batch(&entries).await.unwrap();
        memory_index.add_batch(&entries).await.unwrap();
    });

    let indexes: [(&str, &dyn EntryIndex); 2] = [("log", &log_index), ("memory", &memory_index)];
    for (name, index) in indexes {
        group.bench_function(name, |b| {
            let mut i = 0i32;
            b.iter(|| {
                let position = Position::new(7, i.rem_euclid(count as i32));
                let found = rt.block_on(index.get(black_box(position))).unwrap();
                i = i.wrapping_add(7919);
                black_box(found);
            });
        });
    }

    group.finish();
}

/// Benchmark compaction after deleting a segment.
fn bench_log_index_compact(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("log_index_compact");
    group.sample_size(10);

    group.bench_function("10k_live", |b| {
        let temp_dir = TempDir::new().unwrap();
        let index = LogIndex::open(temp_dir.path(), IndexConfig::default()).unwrap();
        let live: Vec<_> = positions(1, 10_000)
            .into_iter()
            .zip(locations(10_000, 64, 1024))
            .collect();
        rt.block_on(index.add_batch(&live)).unwrap();

        b.iter(|| {
            rt.block_on(async {
                let dead: Vec<_> = positions(0, 1_000)
                    .into_iter()
                    .zip(locations(1_000, 64, 1024))
                    .collect();
                index.add_batch(&dead).await.unwrap();
                index.delete(0).await.unwrap();
                index.compact().await.unwrap();
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_log_index_add_batch,
    bench_index_get,
    bench_log_index_compact,
);

criterion_main!(benches);
