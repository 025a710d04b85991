//! Benchmark utilities for EntryLog.

use bytes::Bytes;
use entrylog_core::{FileLocation, Position};
use rand::Rng;

/// Generate random payload bytes of the specified size.
pub fn random_payload(size: usize) -> Bytes {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen::<u8>()).collect::<Vec<_>>().into()
}

/// Generate `count` consecutive positions in one segment.
pub fn positions(segment_id: i64, count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| Position::new(segment_id, i as i32))
        .collect()
}

/// Generate locations as a directory would hand them out for fixed-size
/// payloads.
pub fn locations(count: usize, payload_size: u32, per_file: usize) -> Vec<FileLocation> {
    (0..count)
        .map(|i| {
            let slot = (i % per_file) as u32;
            FileLocation::new((i / per_file) as u64, 12 + slot * (payload_size + 4))
        })
        .collect()
}

/// A single-threaded runtime for driving async code from benchmarks.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}
