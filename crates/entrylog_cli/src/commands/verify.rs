//! Verify command implementation.

use super::frames;
use entrylog_core::index::INDEX_DIR;
use entrylog_core::{EntryIndex, IndexConfig, LogIndex};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of items checked.
    pub checked: usize,
    /// Number of valid items.
    pub valid: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(
    path: &Path,
    check_entries: bool,
    check_index: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {:?}", path);
    println!();

    let mut entry_result = VerifyResult::default();
    let mut index_result = VerifyResult::default();

    if check_entries {
        println!("Checking entry files...");
        entry_result = verify_entries(path)?;
        print_result("Entry files", &entry_result);
    }

    if check_index {
        if path.join(INDEX_DIR).is_dir() {
            println!("Checking index...");
            index_result = verify_index(path);
            print_result("Index", &index_result);
        } else {
            println!("Index not found (this may be normal for a bare directory)");
        }
    }

    println!();
    if entry_result.is_ok() && index_result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

fn verify_entries(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    for id in frames::list_files(path)? {
        result.checked += 1;
        let backend = frames::open_file(path, id)?;
        let scan = frames::walk(id, &backend, 0, |_| true)?;
        match scan.error {
            None => result.valid += 1,
            Some(error) => result.errors.push(format!("file {id}: {error}")),
        }
    }
    Ok(result)
}

fn verify_index(path: &Path) -> VerifyResult {
    let mut result = VerifyResult {
        checked: 1,
        ..VerifyResult::default()
    };
    match LogIndex::open(path, IndexConfig::default()) {
        Ok(index) => {
            tracing::debug!(positions = index.count(), "index opened");
            result.valid = 1;
        }
        Err(e) => result.errors.push(e.to_string()),
    }
    result
}

fn print_result(name: &str, result: &VerifyResult) {
    println!("  {name}: {}/{} valid", result.valid, result.checked);
    for error in &result.errors {
        println!("    - {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use entrylog_core::{EntryLogger, Position, StorageConfig};
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempdir;

    async fn write_log(path: &Path) {
        let logger = EntryLogger::open(path, StorageConfig::default(), IndexConfig::default())
            .await
            .unwrap();
        logger
            .add_entry(Position::new(0, 0), Bytes::from_static(b"payload"))
            .await
            .unwrap();
        logger.close().await.unwrap();
    }

    #[tokio::test]
    async fn clean_log_passes() {
        let dir = tempdir().unwrap();
        write_log(dir.path()).await;

        let entries = verify_entries(dir.path()).unwrap();
        assert_eq!(entries.checked, 1);
        assert!(entries.is_ok());
        assert!(verify_index(dir.path()).is_ok());
        assert!(run(dir.path(), true, true).is_ok());
    }

    #[tokio::test]
    async fn corrupt_magic_fails() {
        let dir = tempdir().unwrap();
        write_log(dir.path()).await;

        let mut file = OpenOptions::new()
            .write(true)
            .open(dir.path().join("0"))
            .unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        drop(file);

        let entries = verify_entries(dir.path()).unwrap();
        assert_eq!(entries.valid, 0);
        assert_eq!(entries.errors.len(), 1);
        assert!(run(dir.path(), true, false).is_err());
    }
}
