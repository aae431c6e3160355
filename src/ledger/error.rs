//! Ledger error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while reading or writing the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A key read by this transaction was changed by another one before commit.
    #[error("concurrent modification: key {key:?} was updated by another transaction")]
    ConcurrentModification { key: String },

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value is not in the expected shape.
    #[error("corrupted record at {key:?}: {reason}")]
    CorruptedRecord { key: String, reason: String },

    /// Snapshot file could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file does not exist.
    #[error("ledger snapshot not found: {0}")]
    SnapshotNotFound(PathBuf),
}

impl LedgerError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrentModification { .. })
    }

    pub(crate) fn corrupted(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptedRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
