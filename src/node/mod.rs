//! Node API and REPL interface.
//!
//! A node owns one ledger, persisted as a JSON snapshot, and the login
//! session of whoever drives it from the command line.

mod api;
mod config;
mod repl;

pub use api::{tokenize, Node, NodeError, NodeResult};
pub use config::NodeConfig;
pub use repl::{print_response, Repl, ReplConfig};
