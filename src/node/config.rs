//! Node configuration.

use std::path::PathBuf;

/// Node configuration options.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Path to the ledger snapshot file.
    pub path: PathBuf,
    /// Start from an empty ledger when the snapshot does not exist.
    pub create_if_missing: bool,
    /// Log verdict details.
    pub verbose: bool,
    /// Write the snapshot after every invocation that changed the ledger.
    pub auto_save: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".gitledger.json"),
            create_if_missing: true,
            verbose: false,
            auto_save: true,
        }
    }
}

impl NodeConfig {
    /// Create a new configuration with the given snapshot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set verbose flag.
    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Set auto_save flag.
    pub fn auto_save(mut self, value: bool) -> Self {
        self.auto_save = value;
        self
    }

    /// `RUST_LOG`-style default filter for this configuration
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "gitledger=debug"
        } else {
            "gitledger=info"
        }
    }
}
