//! History engine error types
//!
//! Only structural failures are errors here. A well-formed request that breaks
//! a domain rule (duplicate commit, taken branch name, protected `main`) is a
//! plain `false` verdict instead, so callers can tell "refused" apart from
//! "your view of the repository is stale".

use thiserror::Error;

use crate::history::types::{BranchName, CommitHash, InvalidNameError};

/// the main error type for history operations
#[derive(Debug, Error)]
pub enum HistoryError {
    /// the named branch does not exist in the repository
    #[error("branch not found: {0}")]
    BranchNotFound(BranchName),

    /// the commit's first parent is not part of the branch
    #[error("previous commit {parent} not valid for branch {branch}")]
    MissingParent { parent: CommitHash, branch: BranchName },

    /// the commit cannot be appended to the branch (duplicate hash, or no
    /// parent on a non-empty branch)
    #[error("commit {hash} not valid for branch {branch}")]
    InvalidCommit { hash: CommitHash, branch: BranchName },

    /// a bulk append stopped at this commit
    #[error("could not add commit {hash} ({applied} earlier commit(s) applied)")]
    CommitNotApplied { hash: CommitHash, applied: usize },

    /// the referenced commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(CommitHash),

    /// invalid branch name or hash
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),
}

impl HistoryError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HistoryError::BranchNotFound(_)
                | HistoryError::MissingParent { .. }
                | HistoryError::CommitNotFound(_)
        )
    }

    /// check if this error means the caller's view of the repository is stale
    /// and should be re-fetched rather than retried as-is
    pub fn is_structural(&self) -> bool {
        self.is_not_found()
    }
}

/// result type alias for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;
