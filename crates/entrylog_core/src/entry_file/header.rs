//! Fixed-size entry file header.

use crate::error::{CoreError, CoreResult};

/// Magic number at offset 0 of every entry file.
pub const MAGIC: u32 = 0x1234_5678;

/// Size of the header: magic (4) + wrote (4) + flushed (4).
pub const HEADER_SIZE: u32 = 12;

/// Size of the length prefix in front of every payload.
pub const FRAME_PREFIX_SIZE: u32 = 4;

/// The header persisted at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// End of the last reserved frame.
    pub wrote: u32,
    /// End of the durable region.
    pub flushed: u32,
}

impl FileHeader {
    /// Header of a file with no entries.
    pub const EMPTY: Self = Self {
        wrote: HEADER_SIZE,
        flushed: HEADER_SIZE,
    };

    /// Encodes the header, big-endian.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        buf[4..8].copy_from_slice(&self.wrote.to_be_bytes());
        buf[8..12].copy_from_slice(&self.flushed.to_be_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` on a short buffer, a bad magic number or
    /// offsets that precede the header.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE as usize {
            return Err(CoreError::invalid_format(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let magic = read_u32(bytes, 0);
        if magic != MAGIC {
            return Err(CoreError::invalid_format(format!(
                "bad magic number {magic:#010x}"
            )));
        }

        let header = Self {
            wrote: read_u32(bytes, 4),
            flushed: read_u32(bytes, 8),
        };
        if header.wrote < HEADER_SIZE || header.flushed < HEADER_SIZE {
            return Err(CoreError::invalid_format(format!(
                "header offsets wrote={} flushed={} precede the header",
                header.wrote, header.flushed
            )));
        }
        Ok(header)
    }

    /// Whether every reserved byte was flushed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.wrote == self.flushed
    }
}

/// Reads a big-endian u32 at `at`. Callers check the length.
pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_header_layout() {
        let bytes = FileHeader::EMPTY.encode();
        assert_eq!(
            bytes,
            [0x12, 0x34, 0x56, 0x78, 0, 0, 0, 12, 0, 0, 0, 12]
        );
    }

    #[test]
    fn decode_written_header() {
        let header = FileHeader {
            wrote: 1040,
            flushed: 1040,
        };
        let decoded = FileHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.is_clean());
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = FileHeader::EMPTY.encode();
        bytes[0] = 0xFF;
        let err = FileHeader::decode(&bytes).unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(FileHeader::decode(&[0x12, 0x34]).is_err());
    }

    #[test]
    fn decode_rejects_offsets_inside_header() {
        let header = FileHeader {
            wrote: 4,
            flushed: 4,
        };
        assert!(FileHeader::decode(&header.encode()).is_err());
    }

    #[test]
    fn torn_header_is_not_clean() {
        let header = FileHeader {
            wrote: 2068,
            flushed: 1040,
        };
        assert!(!FileHeader::decode(&header.encode()).unwrap().is_clean());
    }
}
