//! Dump command implementation.

use super::frames::{self, FileScan, FrameInfo};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct DumpOutput {
    file: FileScan,
    frames: Vec<FrameInfo>,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    file_id: u64,
    limit: Option<usize>,
    preview: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = dump(path, file_id, limit, preview)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            print_text_output(&output);
        }
    }

    Ok(())
}

fn dump(
    path: &Path,
    file_id: u64,
    limit: Option<usize>,
    preview: usize,
) -> Result<DumpOutput, Box<dyn std::error::Error>> {
    let backend = frames::open_file(path, file_id)?;
    let max_frames = limit.unwrap_or(usize::MAX);
    let mut collected = Vec::new();
    let file = frames::walk(file_id, &backend, preview, |frame| {
        if collected.len() >= max_frames {
            return false;
        }
        collected.push(frame);
        true
    })?;
    Ok(DumpOutput {
        file,
        frames: collected,
    })
}

fn print_text_output(output: &DumpOutput) {
    let file = &output.file;
    println!("Entry file {} ({} bytes)", file.id, file.size);
    if let (Some(wrote), Some(flushed)) = (file.wrote, file.flushed) {
        println!("  wrote={wrote} flushed={flushed}");
    }
    if let Some(error) = &file.error {
        println!("  error: {error}");
    }
    println!();

    if output.frames.is_empty() {
        println!("No frames");
        return;
    }
    println!("{:>10} {:>10}  Preview", "Offset", "Length");
    for frame in &output.frames {
        println!("{:>10} {:>10}  {}", frame.offset, frame.len, frame.preview);
    }
    println!();
    println!("{} frame(s) shown", output.frames.len());
}
