//! Read-only walking of entry files on disk.

use entrylog_core::{FileHeader, FRAME_PREFIX_SIZE, HEADER_SIZE};
use entrylog_storage::{BackendProvider, FileBackend, FileBackendProvider, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// One frame found in an entry file.
#[derive(Debug, Serialize)]
pub struct FrameInfo {
    /// Offset of the length prefix.
    pub offset: u32,
    /// Payload length in bytes.
    pub len: u32,
    /// Leading payload bytes, hex-encoded.
    pub preview: String,
}

/// Summary of one entry file.
#[derive(Debug, Serialize)]
pub struct FileScan {
    /// File id.
    pub id: u64,
    /// Size on disk.
    pub size: u64,
    /// Reserved offset from the header.
    pub wrote: Option<u32>,
    /// Flushed offset from the header.
    pub flushed: Option<u32>,
    /// Frames between the header and the flushed offset.
    pub frames: usize,
    /// Payload bytes in those frames.
    pub payload_bytes: u64,
    /// First problem found, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileScan {
    /// Whether the file decoded cleanly.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Lists entry file ids under `path`.
pub fn list_files(path: &Path) -> Result<Vec<u64>, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("log directory not found: {}", path.display()).into());
    }
    Ok(FileBackendProvider::new(path).list()?)
}

/// Opens entry file `id` under `path` without creating it.
pub fn open_file(path: &Path, id: u64) -> Result<FileBackend, Box<dyn std::error::Error>> {
    let file_path = FileBackendProvider::new(path).file_path(id);
    if !file_path.exists() {
        return Err(format!("entry file {id} not found").into());
    }
    Ok(FileBackend::open_existing(&file_path)?)
}

/// Walks the frames of one file, calling `visit` for each until it
/// returns `false`. Returns the scan summary.
pub fn walk(
    id: u64,
    backend: &dyn StorageBackend,
    preview: usize,
    mut visit: impl FnMut(FrameInfo) -> bool,
) -> Result<FileScan, Box<dyn std::error::Error>> {
    let size = backend.size()?;
    let mut scan = FileScan {
        id,
        size,
        wrote: None,
        flushed: None,
        frames: 0,
        payload_bytes: 0,
        error: None,
    };

    if size < u64::from(HEADER_SIZE) {
        scan.error = Some(format!("file is {size} bytes, shorter than the header"));
        return Ok(scan);
    }
    let header = match FileHeader::decode(&backend.read_at(0, HEADER_SIZE as usize)?) {
        Ok(header) => header,
        Err(e) => {
            scan.error = Some(e.to_string());
            return Ok(scan);
        }
    };
    scan.wrote = Some(header.wrote);
    scan.flushed = Some(header.flushed);

    if !header.is_clean() {
        scan.error = Some(format!(
            "unflushed reservations: wrote={} flushed={}",
            header.wrote, header.flushed
        ));
        return Ok(scan);
    }
    let end = u64::from(header.flushed);
    if end > size {
        scan.error = Some(format!("header claims {end} bytes, file has {size}"));
        return Ok(scan);
    }

    let mut offset = u64::from(HEADER_SIZE);
    while offset < end {
        if offset + u64::from(FRAME_PREFIX_SIZE) > end {
            scan.error = Some(format!("truncated length prefix at {offset}"));
            break;
        }
        let prefix = backend.read_at(offset, FRAME_PREFIX_SIZE as usize)?;
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let data_start = offset + u64::from(FRAME_PREFIX_SIZE);
        if data_start + u64::from(len) > end {
            scan.error = Some(format!("frame at {offset} runs past the flushed offset"));
            break;
        }

        scan.frames += 1;
        scan.payload_bytes += u64::from(len);

        let shown = (len as usize).min(preview);
        let head = if shown > 0 {
            backend.read_at(data_start, shown)?
        } else {
            Vec::new()
        };
        let info = FrameInfo {
            offset: offset as u32,
            len,
            preview: to_hex(&head),
        };
        if !visit(info) {
            break;
        }
        offset = data_start + u64::from(len);
    }

    Ok(scan)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entrylog_core::MAGIC;
    use entrylog_storage::InMemoryBackend;

    fn file_with(frames: &[&[u8]]) -> InMemoryBackend {
        let mut body = Vec::new();
        for frame in frames {
            body.extend_from_slice(&(frame.len() as u32).to_be_bytes());
            body.extend_from_slice(frame);
        }
        let end = HEADER_SIZE + body.len() as u32;
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC.to_be_bytes());
        data.extend_from_slice(&end.to_be_bytes());
        data.extend_from_slice(&end.to_be_bytes());
        data.extend_from_slice(&body);
        InMemoryBackend::with_data(data)
    }

    #[test]
    fn walks_every_frame() {
        let backend = file_with(&[b"abc", b"", b"\x01\x02"]);
        let mut seen = Vec::new();
        let scan = walk(0, &backend, 2, |frame| {
            seen.push((frame.offset, frame.len, frame.preview));
            true
        })
        .unwrap();

        assert!(scan.is_valid());
        assert_eq!(scan.frames, 3);
        assert_eq!(scan.payload_bytes, 5);
        assert_eq!(
            seen,
            vec![
                (12, 3, "6162".to_string()),
                (19, 0, String::new()),
                (23, 2, "0102".to_string()),
            ]
        );
    }

    #[test]
    fn visitor_can_stop_early() {
        let backend = file_with(&[b"a", b"b", b"c"]);
        let mut count = 0;
        walk(0, &backend, 0, |_| {
            count += 1;
            count < 2
        })
        .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn reports_unflushed_header() {
        let backend = file_with(&[b"abc"]);
        backend.poke(4, &100u32.to_be_bytes());
        let scan = walk(0, &backend, 0, |_| true).unwrap();
        assert!(!scan.is_valid());
        assert_eq!(scan.wrote, Some(100));
    }

    #[test]
    fn reports_short_file() {
        let backend = InMemoryBackend::with_data(vec![0; 4]);
        let scan = walk(7, &backend, 0, |_| true).unwrap();
        assert!(scan.error.unwrap().contains("shorter"));
    }

    #[test]
    fn reports_frame_overrun() {
        let backend = file_with(&[b"abcd"]);
        backend.poke(12, &50u32.to_be_bytes());
        let scan = walk(0, &backend, 0, |_| true).unwrap();
        assert_eq!(scan.frames, 0);
        assert!(scan.error.unwrap().contains("runs past"));
    }
}
