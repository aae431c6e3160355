//!  Branches and append validation.
//!
//!  A branch is a named set of commits keyed by hash. The commits form a DAG
//!  through their parent hashes; the branch itself keeps no tip pointer. Every
//!  commit except the first must build on a commit already in the branch, and
//!  must be strictly newer (millisecond resolution) than that parent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::commit::Commit;
use crate::history::error::{HistoryError, HistoryResult};
use crate::history::types::{BranchName, CommitHash};

/// a named view over a set of commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BranchDocument")]
pub struct Branch {
    pub(crate) name: BranchName,
    #[serde(default)]
    pub(crate) commits: BTreeMap<CommitHash, Commit>,
}

/// wire form of a branch, checked before it becomes a [`Branch`]
#[derive(Deserialize)]
struct BranchDocument {
    name: BranchName,
    #[serde(default)]
    commits: BTreeMap<CommitHash, Commit>,
}

impl TryFrom<BranchDocument> for Branch {
    type Error = String;

    /// every commit must be filed under its own hash
    fn try_from(doc: BranchDocument) -> Result<Self, Self::Error> {
        if let Some((key, commit)) = doc.commits.iter().find(|(key, commit)| **key != commit.hash) {
            return Err(format!(
                "branch {}: commit {} is filed under key {}",
                doc.name, commit.hash, key
            ));
        }
        Ok(Self {
            name: doc.name,
            commits: doc.commits,
        })
    }
}

impl Branch {
    /// create an empty branch
    pub fn new(name: BranchName) -> Self {
        Self {
            name,
            commits: BTreeMap::new(),
        }
    }

    /// create a branch that already carries commits (no validation)
    pub fn with_commits(name: BranchName, commits: impl IntoIterator<Item = Commit>) -> Self {
        Self {
            name,
            commits: commits.into_iter().map(|c| (c.hash.clone(), c)).collect(),
        }
    }

    /// the branch name
    pub fn name(&self) -> &BranchName {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: BranchName) {
        self.name = name;
    }

    /// number of commits in the branch
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// check if the branch has no commits yet
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// look up a commit by hash
    pub fn commit(&self, hash: &CommitHash) -> Option<&Commit> {
        self.commits.get(hash)
    }

    /// iterate over commits in hash order
    pub fn commits(&self) -> impl Iterator<Item = &Commit> {
        self.commits.values()
    }

    /// check if the hash has been added to the branch before
    pub fn commit_exists(&self, hash: &CommitHash) -> bool {
        self.commits.contains_key(hash)
    }

    /// Decide whether `commit` may be appended to this branch.
    ///
    /// Only the first parent hash is examined: if it is present the verdict
    /// is whether time moves forward from it, if it is absent that is an
    /// error, and further parents are never looked at. Merge commits therefore
    /// get their extra parents checked only by the repository's global index.
    pub fn valid_commit(&self, commit: &Commit) -> HistoryResult<bool> {
        if !self.commit_exists(&commit.hash) {
            if self.commits.is_empty() {
                return Ok(true);
            }

            if let Some(parent_hash) = commit.first_parent() {
                return match self.commits.get(parent_hash) {
                    Some(parent) => {
                        let time_progressing = parent.timestamp_millis() < commit.timestamp_millis();
                        if !time_progressing {
                            debug!(
                                branch = %self.name,
                                commit = commit.hash.short(),
                                parent = parent_hash.short(),
                                "commit is not newer than its parent"
                            );
                        }
                        Ok(time_progressing)
                    }
                    None => Err(HistoryError::MissingParent {
                        parent: parent_hash.clone(),
                        branch: self.name.clone(),
                    }),
                };
            }
        }

        Err(HistoryError::InvalidCommit {
            hash: commit.hash.clone(),
            branch: self.name.clone(),
        })
    }

    /// Add a commit if it is valid for this branch, or unconditionally when
    /// `pass_validation` is set (trusted replay). Returns whether it was added.
    pub fn add_commit(&mut self, commit: Commit, pass_validation: bool) -> bool {
        let valid = matches!(self.valid_commit(&commit), Ok(true));
        if valid || pass_validation {
            self.commits.insert(commit.hash.clone(), commit);
            return true;
        }
        false
    }

    /// all commits ordered by (timestamp, hash)
    pub fn commits_in_order(&self) -> Vec<&Commit> {
        let mut commits: Vec<&Commit> = self.commits.values().collect();
        commits.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        commits
    }

    /// Commits strictly newer than `since`, or every commit when `since` is
    /// `None`. Used to pull what a client is missing.
    pub fn commits_after(&self, since: Option<&CommitHash>) -> HistoryResult<Vec<&Commit>> {
        let threshold = match since {
            Some(hash) => Some(
                self.commits
                    .get(hash)
                    .ok_or_else(|| HistoryError::CommitNotFound(hash.clone()))?
                    .timestamp,
            ),
            None => None,
        };

        Ok(self
            .commits_in_order()
            .into_iter()
            .filter(|c| threshold.map_or(true, |t| c.timestamp > t))
            .collect())
    }

    /// The newest commit. Ties on the millisecond are broken by hash so every
    /// replica picks the same one.
    pub fn last_commit(&self) -> Option<&Commit> {
        self.commits
            .values()
            .max_by(|a, b| (a.timestamp_millis(), &a.hash).cmp(&(b.timestamp_millis(), &b.hash)))
    }
}
