//! Error types for vcslog-db

use std::path::PathBuf;

/// Storage conditions callers may need to tell apart from plain I/O failures
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("index storage at {0:?} is marked as corrupted")]
    Corrupted(PathBuf),

    #[error("index storage version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("failed to flush {}", .failed.join(", "))]
    Flush { failed: Vec<&'static str> },
}
