//! Entry file and directory benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use entrylog_bench::{random_payload, runtime};
use entrylog_core::{AddOutcome, Directory, EntryFile, StorageConfig};
use entrylog_storage::InMemoryBackendProvider;
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark buffered appends to one in-memory entry file.
fn bench_entry_file_add(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("entry_file_add");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let config = StorageConfig::new()
                .max_entry_file_size(64 << 20)
                .max_entry_cache_per_file(1 << 20);
            let payload = random_payload(size);
            let mut file = new_file(&rt, &config);

            b.iter(|| {
                let outcome = rt.block_on(file.add(black_box(payload.clone()))).unwrap();
                if outcome == AddOutcome::Full {
                    file = new_file(&rt, &config);
                }
                black_box(outcome);
            });
        });
    }

    group.finish();
}

fn new_file(rt: &tokio::runtime::Runtime, config: &StorageConfig) -> EntryFile {
    let file = EntryFile::new(0, Arc::new(InMemoryBackendProvider::new()), config);
    rt.block_on(file.initialize()).unwrap();
    file
}

/// Benchmark reads of flushed and pending entries.
fn bench_entry_file_read(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("entry_file_read");
    let config = StorageConfig::default();

    for (name, flush) in [("flushed", true), ("pending", false)] {
        group.bench_function(name, |b| {
            let file = new_file(&rt, &config);
            let offsets: Vec<u32> = (0..1_000)
                .map(|_| match rt.block_on(file.add(random_payload(256))).unwrap() {
                    AddOutcome::Added(offset) => offset,
                    other => panic!("unexpected outcome {other:?}"),
                })
                .collect();
            if flush {
                rt.block_on(file.flush()).unwrap();
            }

            let mut i = 0;
            b.iter(|| {
                let data = rt.block_on(file.read_entry(offsets[i % offsets.len()])).unwrap();
                i += 1;
                black_box(data);
            });
        });
    }

    group.finish();
}

/// Benchmark directory appends with frequent rollover.
fn bench_directory_add(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("directory_add");

    for threshold in [64 * 1024u64, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(256));
        group.bench_with_input(
            BenchmarkId::new("memory", threshold),
            threshold,
            |b, &threshold| {
                let directory = Directory::new(
                    Arc::new(InMemoryBackendProvider::new()),
                    StorageConfig::new().max_entry_file_size(threshold),
                );
                rt.block_on(directory.initialize()).unwrap();
                let payload = random_payload(256);

                b.iter(|| {
                    let location = rt.block_on(directory.add(black_box(payload.clone()))).unwrap();
                    black_box(location);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark append plus flush against real files.
fn bench_directory_flush(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("directory_flush");

    // Use larger sample size for file operations
    group.sample_size(20);

    for batch in [1, 16, 128].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let temp_dir = TempDir::new().unwrap();
            let directory = Directory::open(temp_dir.path(), StorageConfig::default());
            rt.block_on(directory.initialize()).unwrap();
            let payload = random_payload(512);

            b.iter(|| {
                rt.block_on(async {
                    for _ in 0..batch {
                        directory.add(payload.clone()).await.unwrap();
                    }
                    directory.flush().await.unwrap();
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_entry_file_add,
    bench_entry_file_read,
    bench_directory_add,
    bench_directory_flush,
);

criterion_main!(benches);
