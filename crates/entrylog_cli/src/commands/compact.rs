//! Compact command implementation.

use entrylog_core::index::INDEX_DIR;
use entrylog_core::{EntryIndex, IndexConfig, LogIndex};
use std::path::Path;

/// Index compaction statistics.
#[derive(Debug)]
pub struct CompactStats {
    /// Live positions kept.
    pub positions: usize,
    /// SST bytes before compaction.
    pub sst_before: u64,
    /// SST bytes after compaction.
    pub sst_after: u64,
}

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.join(INDEX_DIR).is_dir() {
        return Err(format!("No index found at {:?}", path).into());
    }

    println!("Compacting index at {:?}", path);
    let stats = compact(path)?;

    println!();
    println!("  Positions:      {}", stats.positions);
    println!("  SST before:     {} bytes", stats.sst_before);
    println!("  SST after:      {} bytes", stats.sst_after);
    println!();
    println!("✓ Compaction complete");
    Ok(())
}

fn compact(path: &Path) -> Result<CompactStats, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    runtime.block_on(async {
        let index = LogIndex::open(path, IndexConfig::default())?;
        let sst_before = index.sst_bytes()?;
        index.compact().await?;
        let stats = CompactStats {
            positions: index.count(),
            sst_before,
            sst_after: index.sst_bytes()?,
        };
        index.close().await?;
        tracing::info!(positions = stats.positions, "index compacted");
        Ok::<_, Box<dyn std::error::Error>>(stats)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use entrylog_core::{FileLocation, Position};
    use tempfile::tempdir;

    #[test]
    fn drops_deleted_segments_and_keeps_live_keys() {
        let dir = tempdir().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let index = LogIndex::open(dir.path(), IndexConfig::default()).unwrap();
            for i in 0..5 {
                index
                    .add(Position::new(2, i), FileLocation::new(0, 12 + i as u32))
                    .await
                    .unwrap();
            }
            index.delete(2).await.unwrap();
            index
                .add(Position::new(3, 0), FileLocation::new(1, 12))
                .await
                .unwrap();
            index.close().await.unwrap();
        });

        let stats = compact(dir.path()).unwrap();
        assert_eq!(stats.positions, 1);
        assert!(stats.sst_after > 0);

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let index = LogIndex::open(dir.path(), IndexConfig::default()).unwrap();
            assert_eq!(index.get(Position::new(2, 3)).await.unwrap(), None);
            assert_eq!(
                index.get(Position::new(3, 0)).await.unwrap(),
                Some(FileLocation::new(1, 12))
            );
        });
    }

    #[test]
    fn missing_index_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(run(dir.path()).is_err());
    }
}
