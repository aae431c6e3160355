//!   The repository aggregate.
//!
//!  A repository owns its branches, a global index of every commit hash ever
//!  accepted, and the access-control state. All operations are pure functions
//!  of the in-memory value and their arguments: no clock, no I/O, and only
//!  ordered collections, so every replica that replays the same call reaches
//!  the same verdict.
//!
//!  The aggregate is not internally synchronized. Callers hold it as one unit
//!  of work and persist it only if the verdict was positive.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::history::access::{AccessControl, AccessLog, UserAccess};
use crate::history::branch::Branch;
use crate::history::commit::Commit;
use crate::history::error::{HistoryError, HistoryResult};
use crate::history::types::{BranchName, CommitHash};

/// A Git-like repository: branches, commits and who may touch them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    name: String,
    author: String,
    directory_cid: String,
    commit_hashes: BTreeSet<CommitHash>,
    branches: BTreeMap<BranchName, Branch>,
    acl: AccessControl,
}

impl Repository {
    /// Create a new repository. The author is logged as owner at
    /// `created_at`, and an empty `main` branch is added.
    pub fn new(
        name: impl Into<String>,
        author: impl Into<String>,
        directory_cid: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::restore(name, author, directory_cid, Vec::new(), created_at)
    }

    /// Rebuild a repository from its persisted access log. With an empty log
    /// the author is seeded as owner, exactly as for a new repository.
    pub fn restore(
        name: impl Into<String>,
        author: impl Into<String>,
        directory_cid: impl Into<String>,
        access_logs: Vec<AccessLog>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let author = author.into();
        let access_logs = if access_logs.is_empty() {
            vec![AccessLog::new(author.clone(), author.clone(), created_at, UserAccess::Owner)]
        } else {
            access_logs
        };

        let mut branches = BTreeMap::new();
        branches.insert(BranchName::main(), Branch::new(BranchName::main()));

        Self {
            name: name.into(),
            author,
            directory_cid: directory_cid.into(),
            commit_hashes: BTreeSet::new(),
            branches,
            acl: AccessControl::from_logs(access_logs),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn directory_cid(&self) -> &str {
        &self.directory_cid
    }

    /// updates the repository's name
    pub fn rename(&mut self, new_name: impl Into<String>) {
        self.name = new_name.into();
    }

    /// every commit hash ever accepted, across all branches
    pub fn commit_hashes(&self) -> &BTreeSet<CommitHash> {
        &self.commit_hashes
    }

    /// Register hashes in the global index without touching any branch.
    ///
    /// Used when restoring hashes whose owning branch has since been deleted.
    pub fn register_commit_hashes(&mut self, hashes: impl IntoIterator<Item = CommitHash>) {
        self.commit_hashes.extend(hashes);
    }

    /// checks if the provided hash has belonged to one of the repo's branches
    pub fn commit_exists(&self, hash: &CommitHash) -> bool {
        self.commit_hashes.contains(hash)
    }

    /// checks if the named branch belongs to this repo
    pub fn branch_exists(&self, name: &BranchName) -> bool {
        self.branches.contains_key(name)
    }

    pub fn branch(&self, name: &BranchName) -> Option<&Branch> {
        self.branches.get(name)
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    /// branch names in sorted order
    pub fn branch_names(&self) -> Vec<BranchName> {
        self.branches.keys().cloned().collect()
    }

    // ==================== Commits ====================

    /// Decide whether `commit` may be appended to `branch_name`.
    ///
    /// `Ok(false)` is a refusal (duplicate, time going backwards, a parent
    /// unknown to the repository). `Err` means the request names something
    /// that does not exist: the branch, or its first parent on that branch.
    pub fn valid_commit(&self, commit: &Commit, branch_name: &BranchName) -> HistoryResult<bool> {
        let branch = self
            .branches
            .get(branch_name)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_name.clone()))?;

        if self.commit_hashes.is_empty() {
            return Ok(true);
        }

        match branch.valid_commit(commit) {
            Ok(true) => {}
            Ok(false) | Err(HistoryError::InvalidCommit { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }

        let missing = commit
            .parent_hashes
            .iter()
            .find(|parent| !self.commit_exists(parent));
        if let Some(parent) = missing {
            debug!(
                commit = commit.hash.short(),
                parent = parent.short(),
                merge = commit.is_merge(),
                "parent unknown to repository"
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// Append a commit to a branch when it is valid, or unconditionally with
    /// `pass_validation`. The hash is indexed only if the branch took it.
    pub fn add_commit(
        &mut self,
        commit: Commit,
        branch_name: &BranchName,
        pass_validation: bool,
    ) -> HistoryResult<bool> {
        let valid = match self.valid_commit(&commit, branch_name) {
            Ok(valid) => valid,
            Err(e) if pass_validation && !matches!(e, HistoryError::BranchNotFound(_)) => true,
            Err(e) => return Err(e),
        };

        if !(valid || pass_validation) {
            return Ok(false);
        }

        let branch = self
            .branches
            .get_mut(branch_name)
            .ok_or_else(|| HistoryError::BranchNotFound(branch_name.clone()))?;

        let hash = commit.hash.clone();
        if !branch.add_commit(commit, pass_validation) {
            return Ok(false);
        }
        self.commit_hashes.insert(hash);
        Ok(true)
    }

    /// Apply commits one at a time in the given order.
    ///
    /// Stops at the first refused commit; commits before it stay applied.
    /// Returns how many commits were added.
    pub fn add_commits(
        &mut self,
        commits: impl IntoIterator<Item = Commit>,
        branch_name: &BranchName,
        pass_validation: bool,
    ) -> HistoryResult<usize> {
        let mut applied = 0;
        for commit in commits {
            let hash = commit.hash.clone();
            if !self.add_commit(commit, branch_name, pass_validation)? {
                return Err(HistoryError::CommitNotApplied { hash, applied });
            }
            applied += 1;
        }

        info!(branch = %branch_name, applied, "commits applied");
        Ok(applied)
    }

    // ==================== Branches ====================

    /// check if branch name is not used before creating a new branch
    pub fn valid_branch(&self, branch: &Branch) -> bool {
        !self.branch_exists(branch.name())
    }

    /// Register a branch, folding whatever commits it already carries into the
    /// global index. `set_if_exists` overwrites an existing branch of the same
    /// name (used when reconstructing from persisted records).
    pub fn add_branch(&mut self, branch: Branch, set_if_exists: bool) -> bool {
        if !(self.valid_branch(&branch) || set_if_exists) {
            debug!(branch = %branch.name(), "branch name already taken");
            return false;
        }

        self.commit_hashes.extend(branch.commits().map(|c| c.hash.clone()));
        self.branches.insert(branch.name.clone(), branch);
        true
    }

    /// Rename a branch. `main` can neither be renamed nor be the new name, and
    /// the new name must be free. Commits and the hash index are untouched.
    pub fn update_branch_name(&mut self, name: &BranchName, new_name: BranchName) -> HistoryResult<bool> {
        if name.is_main() || new_name.is_main() {
            debug!(from = %name, to = %new_name, "main branch cannot take part in a rename");
            return Ok(false);
        }

        if !self.branch_exists(name) {
            return Err(HistoryError::BranchNotFound(name.clone()));
        }

        if self.branch_exists(&new_name) {
            debug!(to = %new_name, "rename target already exists");
            return Ok(false);
        }

        let mut branch = self
            .branches
            .remove(name)
            .ok_or_else(|| HistoryError::BranchNotFound(name.clone()))?;
        branch.set_name(new_name.clone());
        self.branches.insert(new_name, branch);
        Ok(true)
    }

    /// Delete a branch. Its hashes stay in the global index: hashes are a
    /// permanent namespace, branches are only named views over them.
    pub fn delete_branch(&mut self, name: &BranchName) -> HistoryResult<bool> {
        if name.is_main() {
            debug!("main branch cannot be deleted");
            return Ok(false);
        }

        match self.branches.remove(name) {
            Some(_) => Ok(true),
            None => Err(HistoryError::BranchNotFound(name.clone())),
        }
    }

    // ==================== Access ====================

    /// current access of `user`, `NoAccess` if absent
    pub fn get_user_access(&self, user: &str) -> UserAccess {
        self.acl.get(user)
    }

    pub fn can_read(&self, user: &str) -> bool {
        self.get_user_access(user).can_read()
    }

    pub fn can_edit(&self, user: &str) -> bool {
        self.get_user_access(user).can_edit()
    }

    pub fn is_owner(&self, user: &str) -> bool {
        self.get_user_access(user).is_owner()
    }

    /// user -> current access level
    pub fn access(&self) -> &BTreeMap<String, UserAccess> {
        self.acl.access()
    }

    /// the full access audit trail, oldest first
    pub fn access_logs(&self) -> &[AccessLog] {
        self.acl.logs()
    }

    /// Change `authorized`'s access on behalf of `authorizer`.
    ///
    /// Refused unless the authorizer is an owner and the level actually
    /// changes. Owners cannot change their own access, and `timestamp` must be
    /// later than the newest log entry. On success exactly one log entry is
    /// appended.
    pub fn update_access(
        &mut self,
        authorized: &str,
        user_access: UserAccess,
        authorizer: &str,
        timestamp: DateTime<Utc>,
    ) -> bool {
        let updated = self.acl.update(authorized, user_access, authorizer, timestamp);
        if updated {
            info!(repo = %self.name, authorizer, authorized, %user_access, "access updated");
        }
        updated
    }

    // ==================== Documents ====================

    /// Plain serializable view of the repository.
    pub fn to_document(&self) -> RepositoryDocument {
        RepositoryDocument {
            name: self.name.clone(),
            author: self.author.clone(),
            directory_cid: self.directory_cid.clone(),
            commit_hashes: self.commit_hashes.iter().cloned().collect(),
            access: self.acl.access().clone(),
            branches: self.branches.clone(),
            access_logs: self.acl.logs().to_vec(),
        }
    }

    /// Rebuild a repository from a document supplied by an untrusted party.
    ///
    /// The `access` map and `commitHashes` of the document are ignored; they
    /// are derived state. The commits of all branches are replayed together,
    /// oldest first (ties broken by hash, then branch name), so a merge sees
    /// parents from any branch. A commit that does not fit is dropped.
    pub fn from_document(doc: RepositoryDocument, created_at: DateTime<Utc>) -> Self {
        let mut repo = Self::restore(doc.name, doc.author, doc.directory_cid, doc.access_logs, created_at);

        let mut commits: Vec<(BranchName, Commit)> = Vec::new();
        for (name, branch) in doc.branches {
            repo.add_branch(Branch::new(name.clone()), true);
            commits.extend(branch.commits.into_values().map(|c| (name.clone(), c)));
        }
        commits.sort_by(|(a_branch, a), (b_branch, b)| {
            a.order_key().cmp(&b.order_key()).then_with(|| a_branch.cmp(b_branch))
        });

        for (name, commit) in commits {
            let hash = commit.hash.clone();
            match repo.add_commit(commit, &name, false) {
                Ok(true) => {}
                Ok(false) => warn!(branch = %name, commit = %hash, "dropping commit that does not fit history"),
                Err(e) => warn!(branch = %name, commit = %hash, error = %e, "dropping commit"),
            }
        }

        repo
    }
}

/// Serialized form of a [`Repository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDocument {
    pub name: String,
    pub author: String,
    #[serde(rename = "directoryCID", default)]
    pub directory_cid: String,
    #[serde(rename = "commitHashes", default)]
    pub commit_hashes: Vec<CommitHash>,
    #[serde(default)]
    pub access: BTreeMap<String, UserAccess>,
    #[serde(default)]
    pub branches: BTreeMap<BranchName, Branch>,
    #[serde(rename = "accessLogs", default)]
    pub access_logs: Vec<AccessLog>,
}

impl Serialize for Repository {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const T0: i64 = 1_700_000_000_000;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn hash(s: &str) -> CommitHash {
        CommitHash::new(s).unwrap()
    }

    fn name(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn commit(h: &str, parents: &[&str], ms: i64) -> Commit {
        Commit::builder(hash(h), ts(ms))
            .author("alice", "alice@example.com")
            .message(format!("commit {}", h))
            .parents(parents.iter().map(|p| hash(p)).collect())
            .build()
    }

    fn repo() -> Repository {
        Repository::new("proj", "alice", "QmDir", ts(T0 - 10_000))
    }

    #[test]
    fn test_new_repository() {
        let repo = repo();
        assert_eq!(repo.branch_names(), vec![BranchName::main()]);
        assert!(repo.branch(&BranchName::main()).unwrap().is_empty());
        assert_eq!(repo.get_user_access("alice"), UserAccess::Owner);
        assert_eq!(repo.access().len(), 1);
        assert_eq!(repo.access_logs().len(), 1);
        assert!(repo.commit_hashes().is_empty());
    }

    #[test]
    fn test_first_commit_and_ordering() {
        let mut repo = repo();
        let main = BranchName::main();

        assert!(repo.add_commit(commit("c1", &[], T0), &main, false).unwrap());
        assert_eq!(repo.commit_hashes().iter().collect::<Vec<_>>(), vec![&hash("c1")]);

        // earlier than its parent
        assert!(!repo.add_commit(commit("c2", &["c1"], T0 - 1), &main, false).unwrap());
        assert!(!repo.commit_exists(&hash("c2")));

        assert!(repo.add_commit(commit("c2", &["c1"], T0 + 1), &main, false).unwrap());

        // duplicate
        assert!(!repo.add_commit(commit("c2", &["c1"], T0 + 1), &main, false).unwrap());
        assert_eq!(repo.branch(&main).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_branch_is_error() {
        let mut repo = repo();
        let result = repo.add_commit(commit("c1", &[], T0), &name("nope"), true);
        assert!(matches!(result, Err(HistoryError::BranchNotFound(_))));
        assert!(repo.commit_hashes().is_empty());
    }

    #[test]
    fn test_missing_first_parent_is_structural() {
        let mut repo = repo();
        let main = BranchName::main();
        repo.add_commit(commit("c1", &[], T0), &main, false).unwrap();

        let result = repo.valid_commit(&commit("c2", &["ghost"], T0 + 1), &main);
        assert!(matches!(result, Err(HistoryError::MissingParent { .. })));
    }

    #[test]
    fn test_all_parents_must_be_known_globally() {
        let mut repo = repo();
        let main = BranchName::main();
        repo.add_commit(commit("c1", &[], T0), &main, false).unwrap();

        // branch check passes (first parent c1), second parent is unknown everywhere
        let merge = commit("m", &["c1", "ghost"], T0 + 5);
        assert!(repo.branch(&main).unwrap().valid_commit(&merge).unwrap());
        assert!(!repo.valid_commit(&merge, &main).unwrap());
        assert!(!repo.add_commit(merge, &main, false).unwrap());
    }

    #[test]
    fn test_merge_parent_from_other_branch() {
        let mut repo = repo();
        let main = BranchName::main();
        let dev = name("dev");
        repo.add_commit(commit("c1", &[], T0), &main, false).unwrap();
        repo.add_branch(Branch::new(dev.clone()), false);

        // fork: first commit on an empty branch only needs globally known parents
        assert!(repo.add_commit(commit("d1", &["c1"], T0 + 10), &dev, false).unwrap());

        // merge back: second parent lives on dev only, and its timestamp is not checked
        let merge = commit("m1", &["c1", "d1"], T0 + 5);
        assert!(repo.add_commit(merge, &main, false).unwrap());
    }

    #[test]
    fn test_new_branch_first_commit_needs_known_parents() {
        let mut repo = repo();
        repo.add_commit(commit("c1", &[], T0), &BranchName::main(), false).unwrap();
        let dev = name("dev");
        repo.add_branch(Branch::new(dev.clone()), false);

        assert!(!repo.add_commit(commit("d1", &["ghost"], T0 + 1), &dev, false).unwrap());
        // a parentless root is fine on an empty branch
        assert!(repo.add_commit(commit("r1", &[], T0 + 1), &dev, false).unwrap());
    }

    #[test]
    fn test_add_commits_stops_at_first_failure() {
        let mut repo = repo();
        let main = BranchName::main();
        let commits = vec![
            commit("c1", &[], T0),
            commit("c2", &["c1"], T0 + 1),
            commit("c3", &["c2"], T0 + 1),
            commit("c4", &["c3"], T0 + 2),
        ];

        match repo.add_commits(commits, &main, false) {
            Err(HistoryError::CommitNotApplied { hash: h, applied }) => {
                assert_eq!(h, hash("c3"));
                assert_eq!(applied, 2);
            }
            other => panic!("expected CommitNotApplied, got {:?}", other),
        }

        assert!(repo.commit_exists(&hash("c1")));
        assert!(repo.commit_exists(&hash("c2")));
        assert!(!repo.commit_exists(&hash("c3")));
        assert!(!repo.commit_exists(&hash("c4")));
    }

    #[test]
    fn test_add_commits_trusted_replay() {
        let mut repo = repo();
        let applied = repo
            .add_commits(
                vec![commit("c2", &["c1"], T0 + 1), commit("c1", &[], T0)],
                &BranchName::main(),
                true,
            )
            .unwrap();
        assert_eq!(applied, 2);
        assert_eq!(repo.commit_hashes().len(), 2);
    }

    #[test]
    fn test_add_branch() {
        let mut repo = repo();
        let carried = Branch::with_commits(name("import"), vec![commit("x1", &[], T0), commit("x2", &["x1"], T0 + 1)]);

        assert!(repo.valid_branch(&carried));
        assert!(repo.add_branch(carried.clone(), false));
        assert!(repo.commit_exists(&hash("x1")) && repo.commit_exists(&hash("x2")));

        assert!(!repo.valid_branch(&carried));
        assert!(!repo.add_branch(Branch::new(name("import")), false));
        assert_eq!(repo.branch(&name("import")).unwrap().len(), 2);

        // forced overwrite
        assert!(repo.add_branch(Branch::new(name("import")), true));
        assert!(repo.branch(&name("import")).unwrap().is_empty());
    }

    #[test]
    fn test_main_protection() {
        let mut repo = repo();
        let dev = name("dev");
        repo.add_branch(Branch::new(dev.clone()), false);

        assert!(!repo.delete_branch(&BranchName::main()).unwrap());
        assert!(!repo.update_branch_name(&BranchName::main(), name("trunk")).unwrap());
        assert!(!repo.update_branch_name(&dev, BranchName::main()).unwrap());
        assert!(repo.branch_exists(&BranchName::main()));
        assert!(repo.branch_exists(&dev));
    }

    #[test]
    fn test_rename_branch() {
        let mut repo = repo();
        let dev = name("dev");
        repo.add_branch(Branch::with_commits(dev.clone(), vec![commit("d1", &[], T0)]), false);
        repo.add_branch(Branch::new(name("taken")), false);

        assert!(!repo.update_branch_name(&dev, name("taken")).unwrap());
        assert!(matches!(
            repo.update_branch_name(&name("ghost"), name("other")),
            Err(HistoryError::BranchNotFound(_))
        ));

        assert!(repo.update_branch_name(&dev, name("feature")).unwrap());
        assert!(!repo.branch_exists(&dev));
        let renamed = repo.branch(&name("feature")).unwrap();
        assert_eq!(renamed.name(), &name("feature"));
        assert!(renamed.commit_exists(&hash("d1")));
        assert!(repo.commit_exists(&hash("d1")));
    }

    #[test]
    fn test_delete_branch_keeps_hashes() {
        let mut repo = repo();
        let dev = name("dev");
        repo.add_branch(Branch::with_commits(dev.clone(), vec![commit("d1", &[], T0)]), false);

        assert!(repo.delete_branch(&dev).unwrap());
        assert!(!repo.branch_exists(&dev));
        assert!(repo.commit_exists(&hash("d1")));
        assert!(matches!(repo.delete_branch(&dev), Err(HistoryError::BranchNotFound(_))));
    }

    #[test]
    fn test_access_scenario() {
        let mut repo = repo();
        assert!(repo.update_access("bob", UserAccess::ReadWrite, "alice", ts(T0)));
        assert_eq!(repo.access_logs().len(), 2);
        assert!(repo.can_edit("bob"));
        assert!(!repo.is_owner("bob"));

        assert!(!repo.update_access("bob", UserAccess::Owner, "bob", ts(T0 + 1)));
        assert_eq!(repo.access_logs().len(), 2);
        assert_eq!(repo.get_user_access("bob"), UserAccess::ReadWrite);
        assert!(!repo.can_read("carol"));
    }

    #[test]
    fn test_restore_uses_given_logs() {
        let logs = vec![
            AccessLog::new("alice", "alice", ts(0), UserAccess::Owner),
            AccessLog::new("alice", "bob", ts(5), UserAccess::Read),
        ];
        let repo = Repository::restore("proj", "alice", "", logs, ts(100));
        assert_eq!(repo.access_logs().len(), 2);
        assert!(repo.can_read("bob"));
    }

    #[test]
    fn test_document_field_names() {
        let mut repo = repo();
        repo.add_commit(commit("c1", &[], T0), &BranchName::main(), false).unwrap();
        let value = serde_json::to_value(&repo).unwrap();

        for field in ["name", "author", "directoryCID", "commitHashes", "access", "branches", "accessLogs"] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["branches"]["main"]["name"], "main");
        assert!(value["branches"]["main"]["commits"]["c1"].is_object());
        assert_eq!(value["access"]["alice"], 3);
    }

    #[test]
    fn test_from_document_replays_in_time_order() {
        let mut original = repo();
        let main = BranchName::main();
        original.add_commit(commit("c1", &[], T0), &main, false).unwrap();
        original.add_commit(commit("c2", &["c1"], T0 + 1), &main, false).unwrap();
        original.update_access("bob", UserAccess::Read, "alice", ts(T0));

        let mut doc = original.to_document();
        // a commit that does not fit is dropped on the way in
        doc.branches
            .get_mut(&main)
            .unwrap()
            .commits
            .insert(hash("bad"), commit("bad", &["ghost"], T0 + 2));
        // derived state in the document is ignored
        doc.access.insert("mallory".to_string(), UserAccess::Owner);

        let json = serde_json::to_string(&doc).unwrap();
        let parsed: RepositoryDocument = serde_json::from_str(&json).unwrap();
        let rebuilt = Repository::from_document(parsed, ts(0));

        assert_eq!(rebuilt.branch(&main).unwrap().len(), 2);
        assert!(!rebuilt.commit_exists(&hash("bad")));
        assert_eq!(rebuilt.get_user_access("mallory"), UserAccess::NoAccess);
        assert_eq!(rebuilt.get_user_access("bob"), UserAccess::Read);
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_from_document_keeps_cross_branch_merge() {
        let mut repo = repo();
        let main = BranchName::main();
        let alpha = name("alpha");

        repo.add_commit(commit("c1", &[], T0), &main, false).unwrap();
        repo.add_branch(Branch::new(alpha.clone()), false);
        assert!(repo.add_commit(commit("a1", &["c1"], T0 + 1), &alpha, false).unwrap());
        assert!(repo.add_commit(commit("c2", &["c1"], T0 + 2), &main, false).unwrap());
        // second parent lives on main, which sorts after alpha
        assert!(repo.add_commit(commit("a2", &["a1", "c2"], T0 + 3), &alpha, false).unwrap());

        let rebuilt = Repository::from_document(repo.to_document(), ts(0));
        assert_eq!(rebuilt.branch(&alpha).unwrap().len(), 2);
        assert!(rebuilt.commit_exists(&hash("a2")));
        assert_eq!(rebuilt, repo);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let build = || {
            let mut repo = repo();
            let main = BranchName::main();
            let _ = repo.add_commits(
                vec![commit("c1", &[], T0), commit("c2", &["c1"], T0 + 3), commit("c3", &["c2"], T0 + 2)],
                &main,
                false,
            );
            repo.update_access("bob", UserAccess::ReadWrite, "alice", ts(T0));
            serde_json::to_string(&repo).unwrap()
        };
        assert_eq!(build(), build());
    }
}
