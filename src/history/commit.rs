//!  Commit records.
//!
//!  A commit is an immutable description of one change. The file contents
//!  themselves live in external content-addressed storage; a commit only
//!  carries the handles (`storageHashes`) needed to fetch them.
//!
//!  Nothing is checked on construction. Hash uniqueness and parent integrity
//!  are decided later by the branch and repository that receive the commit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::types::CommitHash;

/// one commit as stored on a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    pub hash: CommitHash,
    pub author: String,
    pub author_email: String,
    pub message: String,
    #[serde(default)]
    pub parent_hashes: Vec<CommitHash>,
    pub timestamp: DateTime<Utc>,
    /// logical path -> content address handle
    #[serde(default)]
    pub storage_hashes: BTreeMap<String, String>,
}

impl Commit {
    /// start building a commit with the given hash and timestamp
    pub fn builder(hash: CommitHash, timestamp: DateTime<Utc>) -> CommitBuilder {
        CommitBuilder::new(hash, timestamp)
    }

    /// check if this is a merge commit (has multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() > 1
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<&CommitHash> {
        self.parent_hashes.first()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    /// timestamp at the millisecond resolution used for ordering checks
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// the total order used whenever commits must be listed deterministically
    pub(crate) fn order_key(&self) -> (DateTime<Utc>, &CommitHash) {
        (self.timestamp, &self.hash)
    }
}

/// builder for creating commits with a fluent interface
#[derive(Debug, Clone)]
pub struct CommitBuilder {
    hash: CommitHash,
    timestamp: DateTime<Utc>,
    author: String,
    author_email: String,
    message: String,
    parents: Vec<CommitHash>,
    storage_hashes: BTreeMap<String, String>,
}

impl CommitBuilder {
    /// create a new CommitBuilder
    pub fn new(hash: CommitHash, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash,
            timestamp,
            author: String::new(),
            author_email: String::new(),
            message: String::new(),
            parents: Vec::new(),
            storage_hashes: BTreeMap::new(),
        }
    }

    /// set the author name and email
    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author = name.into();
        self.author_email = email.into();
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitHash) -> Self {
        self.parents.push(parent);
        self
    }

    /// set multiple parents (for merge commits)
    pub fn parents(mut self, parents: Vec<CommitHash>) -> Self {
        self.parents = parents;
        self
    }

    /// record the storage handle for one path
    pub fn storage(mut self, path: impl Into<String>, handle: impl Into<String>) -> Self {
        self.storage_hashes.insert(path.into(), handle.into());
        self
    }

    /// finish the commit
    pub fn build(self) -> Commit {
        Commit {
            hash: self.hash,
            author: self.author,
            author_email: self.author_email,
            message: self.message,
            parent_hashes: self.parents,
            timestamp: self.timestamp,
            storage_hashes: self.storage_hashes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hash(s: &str) -> CommitHash {
        CommitHash::new(s).unwrap()
    }

    #[test]
    fn test_commit_builder() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let commit = Commit::builder(hash("c2"), ts)
            .author("alice", "alice@example.com")
            .message("Second commit\n\nwith a body")
            .parent(hash("c1"))
            .storage("src/lib.rs", "QmHandle")
            .build();

        assert_eq!(commit.first_parent(), Some(&hash("c1")));
        assert!(!commit.is_merge());
        assert_eq!(commit.summary(), "Second commit");
        assert_eq!(commit.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(commit.storage_hashes.get("src/lib.rs").map(String::as_str), Some("QmHandle"));
    }

    #[test]
    fn test_merge_commit() {
        let commit = Commit::builder(hash("m"), Utc::now())
            .parents(vec![hash("a"), hash("b")])
            .build();
        assert!(commit.is_merge());
        assert_eq!(commit.first_parent(), Some(&hash("a")));
    }

    #[test]
    fn test_commit_field_names() {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        let commit = Commit::builder(hash("c1"), ts).author("bob", "bob@example.com").build();
        let value = serde_json::to_value(&commit).unwrap();

        for field in ["hash", "author", "authorEmail", "message", "parentHashes", "timestamp", "storageHashes"] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }

        let back: Commit = serde_json::from_value(value).unwrap();
        assert_eq!(back, commit);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"hash":"c1","author":"a","authorEmail":"a@x","message":"m","timestamp":"2024-01-01T00:00:00Z"}"#;
        let commit: Commit = serde_json::from_str(json).unwrap();
        assert!(commit.parent_hashes.is_empty());
        assert!(commit.storage_hashes.is_empty());
    }
}
