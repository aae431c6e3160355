//! Ledger transactions.
//!
//! A transaction buffers its writes and remembers the version of every key it
//! read. Nothing reaches the store until [`LedgerTx::commit`], which hands both
//! sets to [`LedgerStore::apply`]; if any read went stale in the meantime the
//! whole transaction is rejected. Dropping a transaction discards its writes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use ulid::Ulid;

use crate::ledger::error::{LedgerError, LedgerResult};
use crate::ledger::store::{LedgerStore, ReadSet, Selector, WriteSet};

/// One unit of work against a [`LedgerStore`].
pub struct LedgerTx<'a> {
    store: &'a dyn LedgerStore,
    tx_id: String,
    timestamp: DateTime<Utc>,
    reads: ReadSet,
    writes: WriteSet,
}

impl<'a> LedgerTx<'a> {
    /// Start a transaction stamped with `timestamp`.
    pub fn begin(store: &'a dyn LedgerStore, timestamp: DateTime<Utc>) -> Self {
        Self {
            store,
            tx_id: Ulid::new().to_string().to_lowercase(),
            timestamp,
            reads: ReadSet::new(),
            writes: WriteSet::new(),
        }
    }

    /// Get the transaction ID.
    pub fn id(&self) -> &str {
        &self.tx_id
    }

    /// The timestamp every record written by this transaction carries.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    // ==================== Reads ====================

    /// Read a key, seeing this transaction's own writes.
    pub fn get(&mut self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        if let Some(buffered) = self.writes.get(key) {
            return Ok(buffered.clone());
        }

        let stored = self.store.get(key)?;
        self.observe(key, stored.as_ref().map_or(0, |v| v.version));
        Ok(stored.map(|v| v.value))
    }

    /// Read and decode a JSON document.
    pub fn get_json<T: DeserializeOwned>(&mut self, key: &str) -> LedgerResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Check whether a key currently holds a value.
    pub fn exists(&mut self, key: &str) -> LedgerResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// All entries matching `selector`, in key order, with buffered writes
    /// merged over the store.
    ///
    /// Keys returned by the store join the read set. Keys created by other
    /// transactions after the query are not detected.
    pub fn query(&mut self, selector: &Selector) -> LedgerResult<Vec<(String, Vec<u8>)>> {
        let mut merged: BTreeMap<String, Vec<u8>> = BTreeMap::new();

        for (key, stored) in self.store.query(selector)? {
            self.observe(&key, stored.version);
            merged.insert(key, stored.value);
        }

        for (key, buffered) in &self.writes {
            match buffered {
                Some(value) if selector.matches(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                _ => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    /// Query and decode every match.
    pub fn query_json<T: DeserializeOwned>(&mut self, selector: &Selector) -> LedgerResult<Vec<(String, T)>> {
        self.query(selector)?
            .into_iter()
            .map(|(key, bytes)| decode(&key, &bytes).map(|doc| (key, doc)))
            .collect()
    }

    // ==================== Writes ====================

    /// Buffer a write.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.writes.insert(key.into(), Some(value));
    }

    /// Encode and buffer a JSON document.
    pub fn put_json<T: Serialize>(&mut self, key: impl Into<String>, doc: &T) -> LedgerResult<()> {
        let bytes = serde_json::to_vec(doc)?;
        self.put(key, bytes);
        Ok(())
    }

    /// Buffer a delete.
    pub fn delete(&mut self, key: impl Into<String>) {
        self.writes.insert(key.into(), None);
    }

    // ==================== Transaction Control ====================

    /// Validate the read set and apply all writes atomically.
    ///
    /// Returns the version the writes were stamped with.
    pub fn commit(self) -> LedgerResult<u64> {
        let writes = self.writes.len();
        let version = self.store.apply(&self.reads, self.writes)?;
        debug!(tx = %self.tx_id, reads = self.reads.len(), writes, version, "transaction committed");
        Ok(version)
    }

    /// Discard all buffered writes.
    pub fn rollback(self) {
        debug!(tx = %self.tx_id, writes = self.writes.len(), "transaction rolled back");
    }

    /// first observation wins, later reads must see the same version anyway
    fn observe(&mut self, key: &str, version: u64) {
        self.reads.entry(key.to_string()).or_insert(version);
    }
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> LedgerResult<T> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::corrupted(key, e.to_string()))
}
