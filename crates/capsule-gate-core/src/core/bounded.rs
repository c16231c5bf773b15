// crates/capsule-gate-core/src/core/bounded.rs
// ============================================================================
// Module: Bounded Reads
// Description: Size-limited reads from files and streams.
// Purpose: Keep untrusted inputs from exhausting memory.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every untrusted input (capsule documents, keys, witness results) is read
//! through these helpers. File reads reject on metadata size first, then
//! every read stops one byte past the limit so a growing file or an endless
//! stream still fails with [`ReadLimitError::TooLarge`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by bounded reads.
#[derive(Debug, Error)]
pub enum ReadLimitError {
    /// I/O failure.
    #[error("{0}")]
    Io(#[from] io::Error),
    /// Input exceeds the limit.
    #[error("{size} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Reads a file while enforcing a hard size limit.
///
/// # Errors
///
/// Returns [`ReadLimitError`] when the file cannot be read or is too large.
pub fn read_file_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size > u64::try_from(max_bytes).unwrap_or(u64::MAX) {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    read_with_limit(file, max_bytes)
}

/// Reads at most `max_bytes` from a reader, failing when more remain.
///
/// # Errors
///
/// Returns [`ReadLimitError`] when reading fails or the stream is too long.
pub fn read_with_limit(reader: impl Read, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let read_limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    reader.take(read_limit).read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions."
    )]

    use super::*;

    #[test]
    fn files_within_the_limit_are_read_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.json");
        std::fs::write(&path, b"[1,2,3]").unwrap();
        assert_eq!(read_file_with_limit(&path, 7).unwrap(), b"[1,2,3]");
    }

    #[test]
    fn oversized_files_report_size_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.json");
        std::fs::write(&path, vec![b'x'; 32]).unwrap();
        match read_file_with_limit(&path, 16) {
            Err(ReadLimitError::TooLarge {
                size,
                limit,
            }) => {
                assert_eq!(size, 32);
                assert_eq!(limit, 16);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_file_with_limit(&dir.path().join("absent.json"), 16);
        assert!(matches!(result, Err(ReadLimitError::Io(_))));
    }

    #[test]
    fn streams_past_the_limit_are_rejected() {
        let data: &[u8] = &[0u8; 10];
        assert!(matches!(read_with_limit(data, 9), Err(ReadLimitError::TooLarge { .. })));
        assert_eq!(read_with_limit(data, 10).unwrap().len(), 10);
    }
}
