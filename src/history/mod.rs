//! history engine for gitledger
//!
//! this module decides whether a change to a repository's history is legal:
//! appending commits, creating, renaming and deleting branches, and changing
//! who may access the repository. It never performs I/O. The upper layers
//! (ledger records, contract) load a [`Repository`], call one operation, and
//! write the new state back only when the verdict was positive.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Repository                           │
//! │   (branch lifecycle, global hash index, access control)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               │                             │
//!               ▼                             ▼
//!        ┌─────────────┐               ┌─────────────┐
//!        │   branch    │               │   access    │
//!        │  (append)   │               │ (log + map) │
//!        └─────────────┘               └─────────────┘
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │   commit    │
//!        │  (records)  │
//!        └─────────────┘
//!  ```
//!
//! # Verdicts
//!
//! Operations answer in two channels. `Ok(false)` (or a plain `false`) is a
//! refusal of a well-formed request; `Err(HistoryError)` means the request
//! referenced something the engine cannot resolve.
//!
//! # Usage
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use gitledger::history::{BranchName, Commit, CommitHash, Repository};
//!
//! let t0 = Utc.timestamp_millis_opt(1_000).unwrap();
//! let mut repo = Repository::new("proj", "alice", "", t0);
//!
//! let c1 = Commit::builder(CommitHash::new("c1").unwrap(), t0).build();
//! assert!(repo.add_commit(c1, &BranchName::main(), false).unwrap());
//! ```

mod access;
mod branch;
mod commit;
mod error;
mod repository;
mod types;

// Re-export public API
pub use access::{AccessLog, UserAccess};
pub use branch::Branch;
pub use commit::{Commit, CommitBuilder};
pub use error::{HistoryError, HistoryResult};
pub use repository::{Repository, RepositoryDocument};
pub use types::{BranchName, CommitHash, InvalidNameError};
