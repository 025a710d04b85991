//! Stress runners for entry log directories.
//!
//! Writers append concurrently; every accepted entry is then read back
//! and compared against what was written.

use bytes::Bytes;
use entrylog_core::{Directory, FileLocation};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Entries whose read-back did not match.
    pub mismatches: usize,
    /// Distinct entry files written to.
    pub files_used: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    fn new(
        successful: usize,
        failed: usize,
        mismatches: usize,
        files_used: usize,
        duration: Duration,
    ) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            mismatches,
            files_used,
            duration,
            ops_per_second,
        }
    }

    /// Whether every operation succeeded and read back intact.
    pub fn is_clean(&self) -> bool {
        self.failed_ops == 0 && self.mismatches == 0
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Mismatches: {}", self.mismatches);
        println!("Files used: {}", self.files_used);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent writer tasks.
    pub writers: usize,
    /// Entries appended by each writer.
    pub entries_per_writer: usize,
    /// Smallest payload size in bytes.
    pub min_payload: usize,
    /// Largest payload size in bytes.
    pub max_payload: usize,
    /// Flush the directory after this many appends per writer (0 = never).
    pub flush_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 4,
            entries_per_writer: 1_000,
            min_payload: 16,
            max_payload: 256,
            flush_every: 0,
        }
    }
}

/// Appends from `config.writers` concurrent tasks, then reads every entry
/// back.
pub async fn stress_concurrent_appends(
    directory: Arc<Directory>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();

    let handles: Vec<_> = (0..config.writers)
        .map(|writer| {
            let directory = Arc::clone(&directory);
            let config = config.clone();
            tokio::spawn(async move { run_writer(&directory, writer, &config).await })
        })
        .collect();

    let mut written = Vec::new();
    let mut failed = 0;
    for outcome in futures::future::join_all(handles).await {
        match outcome {
            Ok((entries, writer_failures)) => {
                written.extend(entries);
                failed += writer_failures;
            }
            Err(_) => failed += config.entries_per_writer,
        }
    }

    let mut mismatches = 0;
    let mut seen = HashSet::new();
    for (location, payload) in &written {
        if !seen.insert(*location) {
            mismatches += 1;
            continue;
        }
        match directory.read_entry(*location).await {
            Ok(data) if data == *payload => {}
            _ => mismatches += 1,
        }
    }
    let files_used = seen
        .iter()
        .map(|location| location.file_id)
        .collect::<HashSet<_>>()
        .len();

    StressTestResult::new(written.len(), failed, mismatches, files_used, start.elapsed())
}

async fn run_writer(
    directory: &Directory,
    writer: usize,
    config: &StressConfig,
) -> (Vec<(FileLocation, Bytes)>, usize) {
    let mut written = Vec::with_capacity(config.entries_per_writer);
    let mut failed = 0;
    for i in 0..config.entries_per_writer {
        let payload = make_payload(writer, i, config);
        match directory.add(payload.clone()).await {
            Ok(location) => written.push((location, payload)),
            Err(_) => failed += 1,
        }
        let flush_due = config.flush_every > 0 && (i + 1) % config.flush_every == 0;
        if flush_due && directory.flush().await.is_err() {
            failed += 1;
        }
    }
    (written, failed)
}

fn make_payload(writer: usize, index: usize, config: &StressConfig) -> Bytes {
    let max = config.max_payload.max(config.min_payload);
    let len = rand::thread_rng().gen_range(config.min_payload..=max);
    let tag = format!("{writer}:{index}:");
    let mut data = tag.into_bytes();
    data.resize(len.max(data.len()), (writer as u8).wrapping_add(index as u8));
    Bytes::from(data)
}
