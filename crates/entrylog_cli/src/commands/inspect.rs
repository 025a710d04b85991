//! Inspect command implementation.

use super::frames::{self, FileScan};
use entrylog_core::index::INDEX_DIR;
use entrylog_core::{EntryIndex, IndexConfig, LogIndex};
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory path.
    pub path: String,
    /// Number of entry files.
    pub file_count: usize,
    /// Lowest entry file id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_file: Option<u64>,
    /// Highest entry file id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_file: Option<u64>,
    /// Total entry file size in bytes.
    pub total_size: u64,
    /// Number of frames across all files.
    pub frame_count: usize,
    /// Payload bytes across all files.
    pub payload_bytes: u64,
    /// Index statistics, if an index exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStats>,
    /// Per-file details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileScan>>,
}

/// Statistics for the position index.
#[derive(Debug, Serialize)]
pub struct IndexStats {
    /// Number of indexed positions.
    pub positions: usize,
    /// Size of the index's SST files in bytes.
    pub sst_bytes: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_files: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_files)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn inspect(path: &Path, show_files: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let ids = frames::list_files(path)?;

    let mut scans = Vec::with_capacity(ids.len());
    for &id in &ids {
        let backend = frames::open_file(path, id)?;
        scans.push(frames::walk(id, &backend, 0, |_| true)?);
    }

    let index = if path.join(INDEX_DIR).is_dir() {
        let index = LogIndex::open(path, IndexConfig::default())?;
        Some(IndexStats {
            positions: index.count(),
            sst_bytes: index.sst_bytes()?,
        })
    } else {
        None
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        file_count: ids.len(),
        first_file: ids.first().copied(),
        last_file: ids.last().copied(),
        total_size: scans.iter().map(|s| s.size).sum(),
        frame_count: scans.iter().map(|s| s.frames).sum(),
        payload_bytes: scans.iter().map(|s| s.payload_bytes).sum(),
        index,
        files: show_files.then_some(scans),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("EntryLog Inspection Report");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Entry Files:");
    println!("  Count:         {}", result.file_count);
    if let (Some(first), Some(last)) = (result.first_file, result.last_file) {
        println!("  Ids:           {first}..={last}");
    }
    println!("  Total size:    {} bytes", result.total_size);
    println!("  Frames:        {}", result.frame_count);
    println!("  Payload bytes: {}", result.payload_bytes);

    if let Some(index) = &result.index {
        println!();
        println!("Index:");
        println!("  Positions:     {}", index.positions);
        println!("  SST size:      {} bytes", index.sst_bytes);
    }

    if let Some(files) = &result.files {
        println!();
        println!("Files:");
        println!(
            "  {:>8} {:>12} {:>12} {:>8}  Status",
            "Id", "Size", "Flushed", "Frames"
        );
        for file in files {
            let flushed = file
                .flushed
                .map_or_else(|| "-".to_string(), |f| f.to_string());
            let status = file.error.as_deref().unwrap_or("ok");
            println!(
                "  {:>8} {:>12} {:>12} {:>8}  {}",
                file.id, file.size, flushed, file.frames, status
            );
        }
    }
}
