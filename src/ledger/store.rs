//! Key-value world state.
//!
//! The ledger is a flat map from string keys to JSON documents. Every key
//! carries the version at which it was last written, which is what optimistic
//! concurrency control checks at commit time: a transaction records the
//! version of everything it read, and its writes are applied only if none of
//! those versions moved in the meantime.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ledger::error::{LedgerError, LedgerResult};

/// A stored value with the version it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: u64,
    pub value: Vec<u8>,
}

/// Buffered writes: `Some(bytes)` puts, `None` deletes.
pub type WriteSet = BTreeMap<String, Option<Vec<u8>>>;

/// Keys read by a transaction and the version observed (0 = absent).
pub type ReadSet = BTreeMap<String, u64>;

/// Equality match on the tags every ledger document carries.
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub doc_name: Option<String>,
    pub repo_id: Option<String>,
    pub branch_name: Option<String>,
    pub name: Option<String>,
}

impl Selector {
    /// select documents of one kind
    pub fn doc(doc_name: impl Into<String>) -> Self {
        Self {
            doc_name: Some(doc_name.into()),
            ..Default::default()
        }
    }

    pub fn repo(mut self, repo_id: impl Into<String>) -> Self {
        self.repo_id = Some(repo_id.into());
        self
    }

    pub fn branch(mut self, branch_name: impl Into<String>) -> Self {
        self.branch_name = Some(branch_name.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// check a raw stored value against this selector
    pub fn matches(&self, value: &[u8]) -> bool {
        let doc: Value = match serde_json::from_slice(value) {
            Ok(doc) => doc,
            Err(_) => return false,
        };

        let field_matches = |field: &str, expected: &Option<String>| match expected {
            Some(expected) => doc.get(field).and_then(Value::as_str) == Some(expected.as_str()),
            None => true,
        };

        field_matches("docName", &self.doc_name)
            && field_matches("repoID", &self.repo_id)
            && field_matches("branchName", &self.branch_name)
            && field_matches("name", &self.name)
    }
}

/// Storage backend for the ledger world state.
pub trait LedgerStore: Send + Sync {
    /// Read one key.
    fn get(&self, key: &str) -> LedgerResult<Option<Versioned>>;

    /// All entries matching the selector, in key order.
    fn query(&self, selector: &Selector) -> LedgerResult<Vec<(String, Versioned)>>;

    /// Atomically check the read set and apply the writes.
    ///
    /// Fails with [`LedgerError::ConcurrentModification`] without applying
    /// anything if any key in `reads` is no longer at the observed version.
    /// Returns the version the writes were stamped with.
    fn apply(&self, reads: &ReadSet, writes: WriteSet) -> LedgerResult<u64>;
}

#[derive(Debug, Default)]
struct LedgerState {
    height: u64,
    entries: BTreeMap<String, Versioned>,
}

/// In-memory ledger, optionally persisted as a JSON snapshot.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of applied write batches.
    pub fn height(&self) -> u64 {
        self.state.read().height
    }

    /// Load a snapshot written by [`MemoryLedger::save`].
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LedgerError::SnapshotNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        let mut entries = BTreeMap::new();
        for (key, entry) in snapshot.entries {
            let value = STANDARD
                .decode(entry.value.as_bytes())
                .map_err(|e| LedgerError::corrupted(&key, e.to_string()))?;
            entries.insert(key, Versioned { version: entry.version, value });
        }

        debug!(path = %path.display(), keys = entries.len(), "ledger snapshot loaded");
        Ok(Self {
            state: RwLock::new(LedgerState {
                height: snapshot.height,
                entries,
            }),
        })
    }

    /// Write the whole state to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> LedgerResult<()> {
        let path = path.as_ref();
        let snapshot = {
            let state = self.state.read();
            Snapshot {
                height: state.height,
                entries: state
                    .entries
                    .iter()
                    .map(|(key, v)| {
                        (
                            key.clone(),
                            SnapshotEntry {
                                version: v.version,
                                value: STANDARD.encode(&v.value),
                            },
                        )
                    })
                    .collect(),
            }
        };

        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(path, bytes)?;
        debug!(path = %path.display(), height = snapshot.height, "ledger snapshot saved");
        Ok(())
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, key: &str) -> LedgerResult<Option<Versioned>> {
        Ok(self.state.read().entries.get(key).cloned())
    }

    fn query(&self, selector: &Selector) -> LedgerResult<Vec<(String, Versioned)>> {
        let state = self.state.read();
        Ok(state
            .entries
            .iter()
            .filter(|(_, v)| selector.matches(&v.value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&self, reads: &ReadSet, writes: WriteSet) -> LedgerResult<u64> {
        let mut state = self.state.write();

        for (key, observed) in reads {
            let current = state.entries.get(key).map_or(0, |v| v.version);
            if current != *observed {
                return Err(LedgerError::ConcurrentModification { key: key.clone() });
            }
        }

        if writes.is_empty() {
            return Ok(state.height);
        }

        state.height += 1;
        let version = state.height;
        for (key, value) in writes {
            match value {
                Some(value) => {
                    state.entries.insert(key, Versioned { version, value });
                }
                None => {
                    state.entries.remove(&key);
                }
            }
        }

        Ok(version)
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    height: u64,
    entries: BTreeMap<String, SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    version: u64,
    /// base64, since values are opaque bytes
    value: String,
}
