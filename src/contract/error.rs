//! Contract error types.

use thiserror::Error;

use crate::history::{HistoryError, InvalidNameError};
use crate::ledger::LedgerError;

/// Result type for contract invocations.
pub type ContractResult<T> = Result<T, ContractError>;

/// Errors returned by [`Contract::invoke`](crate::contract::Contract::invoke).
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("invalid smart contract function name: {0}")]
    UnknownFunction(String),

    #[error("bad arguments for {function}: {reason}")]
    BadArguments { function: String, reason: String },

    #[error("please log in first")]
    NotAuthenticated,

    #[error("wrong public key provided for user {0}")]
    AuthenticationFailed(String),

    #[error("user {0} does not exist")]
    UserNotFound(String),

    #[error("user {0} already exists")]
    UserExists(String),

    #[error("repo {author}/{name} does not exist")]
    RepoNotFound { author: String, name: String },

    #[error("repo {author}/{name} already exists")]
    RepoExists { author: String, name: String },

    #[error("user {user} is not authorized to {action}")]
    PermissionDenied { user: String, action: String },

    /// A well-formed request the repository refused.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ContractError {
    pub(crate) fn bad_arguments(function: &str, reason: impl Into<String>) -> Self {
        Self::BadArguments {
            function: function.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn repo_not_found(author: &str, name: &str) -> Self {
        Self::RepoNotFound {
            author: author.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn denied(user: &str, action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            user: user.to_string(),
            action: action.into(),
        }
    }

    /// Another transaction touched the same keys; running the same command
    /// again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ContractError::Ledger(e) if e.is_retryable())
    }

    /// The request referenced history the ledger does not have. The caller
    /// should re-fetch before trying again.
    pub fn is_stale_view(&self) -> bool {
        matches!(self, ContractError::History(e) if e.is_structural())
    }

    /// Check if this is a domain refusal rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ContractError::Rejected(_) | ContractError::PermissionDenied { .. })
    }
}
