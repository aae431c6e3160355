//! gitledger - Git-like repository history on a key-value ledger
//!
//! This crate keeps the metadata of Git-style repositories (commits,
//! branches, per-user access rights) in a versioned key-value world state.
//! Every contract invocation runs as one ledger transaction: it reads what it
//! needs, validates the mutation against the repository's history rules, and
//! commits its write set only if nothing it read has changed in the meantime.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use gitledger::node::Node;
//!
//! let mut node = Node::open(".gitledger.json").unwrap();
//! node.execute("registerNewUser alice alice@example.com pk1", Utc::now()).unwrap();
//! node.execute("logIn alice pk1", Utc::now()).unwrap();
//! node.execute(
//!     r#"addNewRepo '{"name": "proj", "author": "alice", "directoryCID": "QmDir"}'"#,
//!     Utc::now(),
//! )
//! .unwrap();
//! ```

pub mod contract;
pub mod history;
pub mod ledger;
pub mod node;
