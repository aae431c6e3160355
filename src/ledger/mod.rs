//! Ledger layer for gitledger.
//!
//! The world state is a versioned key-value map. Each contract invocation runs
//! in one [`LedgerTx`], which records what it read and buffers what it writes;
//! the store applies the writes only if nothing it read has changed since.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         records                             │
//! │       (Repository <-> repo / branch / commit / access rows) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         LedgerTx                            │
//! │           (read set, buffered writes, commit)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  LedgerStore / MemoryLedger                 │
//! │          (versioned keys, selector queries, snapshot)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use gitledger::history::Repository;
//! use gitledger::ledger::{records, LedgerTx, MemoryLedger};
//!
//! let ledger = MemoryLedger::new();
//! let now = Utc::now();
//!
//! let mut tx = LedgerTx::begin(&ledger, now);
//! records::store_repository(&mut tx, &Repository::new("proj", "alice", "", now)).unwrap();
//! tx.commit().unwrap();
//!
//! let mut tx = LedgerTx::begin(&ledger, now);
//! let repo = records::load_repository(&mut tx, "alice", "proj").unwrap().unwrap();
//! assert!(repo.is_owner("alice"));
//! ```

mod error;
pub mod keys;
pub mod records;
mod store;
mod tx;

pub use error::{LedgerError, LedgerResult};
pub use records::{LedgerDoc, RepoRecord, UserRecord};
pub use store::{LedgerStore, MemoryLedger, ReadSet, Selector, Versioned, WriteSet};
pub use tx::LedgerTx;
