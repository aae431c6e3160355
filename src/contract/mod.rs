//! Contract layer for gitledger.
//!
//! This is the surface clients talk to. A request is a [`Command`], made by an
//! explicitly passed [`UserIdentity`] at a caller-supplied timestamp; the
//! [`Contract`] checks who may do it, loads the repository from the ledger,
//! asks the history engine for a verdict and writes back on success.
//!
//! # Architecture
//!
//! ```text
//!   "push alice proj main {..}"
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │   Command::parse    │
//!   └─────────────────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐      ┌─────────────────────┐
//!   │  Contract::invoke   │─────▶│      LedgerTx       │
//!   │ (identity, access)  │      │  (records, commit)  │
//!   └─────────────────────┘      └─────────────────────┘
//!              │
//!              ▼
//!   ┌─────────────────────┐
//!   │     Repository      │
//!   │     (verdicts)      │
//!   └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use gitledger::contract::{Command, Contract, UserIdentity};
//! use gitledger::ledger::MemoryLedger;
//!
//! let contract = Contract::new(MemoryLedger::new());
//! let register = Command::parse(
//!     "registerNewUser",
//!     &["alice".to_string(), "alice@example.com".to_string(), "pk".to_string()],
//! ).unwrap();
//! contract.invoke(None, Utc::now(), register).unwrap();
//!
//! let alice: UserIdentity = contract.authenticate("alice", "pk").unwrap();
//! assert_eq!(alice.email, "alice@example.com");
//! ```

mod command;
#[allow(clippy::module_inception)]
mod contract;
mod error;
mod identity;
mod response;

pub use command::Command;
pub use contract::Contract;
pub use error::{ContractError, ContractResult};
pub use identity::UserIdentity;
pub use response::Response;
