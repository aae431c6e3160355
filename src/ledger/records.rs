//! Ledger rows and the mapping between rows and the repository aggregate.
//!
//! A repository is spread over several rows so that a push only writes the
//! commits it adds:
//!
//! ```text
//! repo_key(author, name)                      repo row
//! \0index-Branch\0repo\0branch\0              one per branch
//! \0index-BranchCommits\0repo\0branch\0hash\0 one per commit
//! \0index-RepoUserAccess\0repo\0user\0ts\0    one per access log entry
//! user_key(name, publicKey)                   one per user
//! ```
//!
//! Every row is a JSON document tagged with `docName` and (except users)
//! `repoID`, which is what [`Selector`] matches on.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::{AccessLog, Branch, BranchName, Commit, CommitHash, Repository};
use crate::ledger::error::{LedgerError, LedgerResult};
use crate::ledger::keys::{
    composite_key, repo_key, user_key, BRANCH_COMMITS_INDEX, BRANCH_INDEX, REPO_USER_ACCESS_INDEX,
};
use crate::ledger::store::Selector;
use crate::ledger::tx::LedgerTx;

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "docName")]
pub enum LedgerDoc {
    #[serde(rename = "user")]
    User(UserRecord),
    #[serde(rename = "repo")]
    Repo(RepoRecord),
    #[serde(rename = "branch")]
    Branch(BranchRecord),
    #[serde(rename = "commit")]
    Commit(CommitRecord),
    #[serde(rename = "userAccess")]
    UserAccess(AccessRecord),
}

impl LedgerDoc {
    /// value of the `docName` tag
    pub fn doc_name(&self) -> &'static str {
        match self {
            LedgerDoc::User(_) => "user",
            LedgerDoc::Repo(_) => "repo",
            LedgerDoc::Branch(_) => "branch",
            LedgerDoc::Commit(_) => "commit",
            LedgerDoc::UserAccess(_) => "userAccess",
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub public_key: String,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>, public_key: impl Into<String>) -> Self {
        let name = name.into();
        let public_key = public_key.into();
        Self {
            user_id: user_key(&name, &public_key),
            name,
            email: email.into(),
            public_key,
        }
    }
}

/// Repository header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRecord {
    #[serde(rename = "repoID")]
    pub repo_id: String,
    pub name: String,
    pub author: String,
    #[serde(rename = "directoryCID", default)]
    pub directory_cid: String,
    /// every hash ever accepted, including those of deleted branches
    #[serde(rename = "commitHashes", default)]
    pub commit_hashes: Vec<CommitHash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    #[serde(rename = "repoID")]
    pub repo_id: String,
    #[serde(rename = "branchName")]
    pub branch_name: BranchName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    #[serde(rename = "repoID")]
    pub repo_id: String,
    #[serde(rename = "branchName")]
    pub branch_name: BranchName,
    #[serde(flatten)]
    pub commit: Commit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    #[serde(rename = "repoID")]
    pub repo_id: String,
    #[serde(flatten)]
    pub log: AccessLog,
}

// ==================== Keys ====================

/// Key of a branch row.
pub fn branch_key(repo_id: &str, branch: &BranchName) -> String {
    composite_key(BRANCH_INDEX, &[repo_id, branch.as_str()])
}

/// Key of a commit row.
pub fn commit_key(repo_id: &str, branch: &BranchName, hash: &CommitHash) -> String {
    composite_key(BRANCH_COMMITS_INDEX, &[repo_id, branch.as_str(), hash.as_str()])
}

/// Key of an access log row. Nanosecond timestamps keep two entries for the
/// same user apart.
pub fn access_key(repo_id: &str, log: &AccessLog) -> String {
    let ts = log.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
    composite_key(REPO_USER_ACCESS_INDEX, &[repo_id, &log.authorized, &ts])
}

// ==================== Repositories ====================

/// Read the repository header row.
pub fn find_repository_row(tx: &mut LedgerTx<'_>, author: &str, name: &str) -> LedgerResult<Option<RepoRecord>> {
    let key = repo_key(author, name);
    match tx.get_json::<LedgerDoc>(&key)? {
        Some(LedgerDoc::Repo(record)) => Ok(Some(record)),
        Some(other) => Err(unexpected(&key, "repo", &other)),
        None => Ok(None),
    }
}

/// Rebuild a repository from its rows.
///
/// Rows come from the ledger and were validated when written, so commits are
/// replayed with `pass_validation`. Access rows are ordered by timestamp,
/// branches by name and each branch's commits by (timestamp, hash).
pub fn load_repository(tx: &mut LedgerTx<'_>, author: &str, name: &str) -> LedgerResult<Option<Repository>> {
    let record = match find_repository_row(tx, author, name)? {
        Some(record) => record,
        None => return Ok(None),
    };
    let repo_id = record.repo_id.clone();

    let mut logs: Vec<AccessLog> = Vec::new();
    for (key, doc) in tx.query_json::<LedgerDoc>(&Selector::doc("userAccess").repo(&repo_id))? {
        match doc {
            LedgerDoc::UserAccess(access) => logs.push(access.log),
            other => return Err(unexpected(&key, "userAccess", &other)),
        }
    }
    // rows arrive in key order, the stable sort keeps it among equal timestamps
    logs.sort_by_key(|log| log.timestamp);

    let mut repo = Repository::restore(record.name, record.author, record.directory_cid, logs, tx.timestamp());
    repo.register_commit_hashes(record.commit_hashes);

    let mut branch_names: Vec<BranchName> = Vec::new();
    for (key, doc) in tx.query_json::<LedgerDoc>(&Selector::doc("branch").repo(&repo_id))? {
        match doc {
            LedgerDoc::Branch(branch) => branch_names.push(branch.branch_name),
            other => return Err(unexpected(&key, "branch", &other)),
        }
    }
    branch_names.sort();

    for branch_name in branch_names {
        repo.add_branch(Branch::new(branch_name.clone()), true);

        let selector = Selector::doc("commit").repo(&repo_id).branch(branch_name.as_str());
        let mut commits: Vec<Commit> = Vec::new();
        for (key, doc) in tx.query_json::<LedgerDoc>(&selector)? {
            match doc {
                LedgerDoc::Commit(row) => commits.push(row.commit),
                other => return Err(unexpected(&key, "commit", &other)),
            }
        }
        commits.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

        repo.add_commits(commits, &branch_name, true)
            .map_err(|e| LedgerError::corrupted(&repo_id, e.to_string()))?;
    }

    debug!(repo = %repo.name(), author = %repo.author(), branches = repo.branch_names().len(), "repository loaded");
    Ok(Some(repo))
}

/// Write only the header row (name, directory, hash index).
pub fn store_repository_row(tx: &mut LedgerTx<'_>, repo: &Repository) -> LedgerResult<()> {
    let repo_id = repo_key(repo.author(), repo.name());
    let record = RepoRecord {
        repo_id: repo_id.clone(),
        name: repo.name().to_string(),
        author: repo.author().to_string(),
        directory_cid: repo.directory_cid().to_string(),
        commit_hashes: repo.commit_hashes().iter().cloned().collect(),
    };
    tx.put_json(repo_id, &LedgerDoc::Repo(record))
}

/// Write every row of a repository.
pub fn store_repository(tx: &mut LedgerTx<'_>, repo: &Repository) -> LedgerResult<()> {
    store_repository_row(tx, repo)?;
    for log in repo.access_logs() {
        store_access_log(tx, repo.author(), repo.name(), log)?;
    }
    for branch in repo.branches() {
        store_branch(tx, repo.author(), repo.name(), branch)?;
    }
    Ok(())
}

/// Write a branch row and all of its commit rows.
pub fn store_branch(tx: &mut LedgerTx<'_>, author: &str, repo_name: &str, branch: &Branch) -> LedgerResult<()> {
    let repo_id = repo_key(author, repo_name);
    let record = BranchRecord {
        repo_id: repo_id.clone(),
        branch_name: branch.name().clone(),
    };
    tx.put_json(branch_key(&repo_id, branch.name()), &LedgerDoc::Branch(record))?;
    store_commits(tx, author, repo_name, branch.name(), branch.commits())
}

/// Write commit rows for one branch.
pub fn store_commits<'c>(
    tx: &mut LedgerTx<'_>,
    author: &str,
    repo_name: &str,
    branch: &BranchName,
    commits: impl IntoIterator<Item = &'c Commit>,
) -> LedgerResult<()> {
    let repo_id = repo_key(author, repo_name);
    for commit in commits {
        let record = CommitRecord {
            repo_id: repo_id.clone(),
            branch_name: branch.clone(),
            commit: commit.clone(),
        };
        tx.put_json(commit_key(&repo_id, branch, &commit.hash), &LedgerDoc::Commit(record))?;
    }
    Ok(())
}

/// Write one access log row.
pub fn store_access_log(tx: &mut LedgerTx<'_>, author: &str, repo_name: &str, log: &AccessLog) -> LedgerResult<()> {
    let repo_id = repo_key(author, repo_name);
    let record = AccessRecord {
        repo_id: repo_id.clone(),
        log: log.clone(),
    };
    tx.put_json(access_key(&repo_id, log), &LedgerDoc::UserAccess(record))
}

/// Delete a branch row and its commit rows.
pub fn remove_branch(tx: &mut LedgerTx<'_>, author: &str, repo_name: &str, branch: &Branch) {
    let repo_id = repo_key(author, repo_name);
    for commit in branch.commits() {
        tx.delete(commit_key(&repo_id, branch.name(), &commit.hash));
    }
    tx.delete(branch_key(&repo_id, branch.name()));
}

/// Delete every row tagged with the repository's id, header included.
/// Returns the number of rows removed.
pub fn remove_repository(tx: &mut LedgerTx<'_>, author: &str, name: &str) -> LedgerResult<usize> {
    let repo_id = repo_key(author, name);
    let keys: Vec<String> = tx
        .query(&Selector::default().repo(&repo_id))?
        .into_iter()
        .map(|(key, _)| key)
        .collect();

    let removed = keys.len();
    for key in keys {
        tx.delete(key);
    }
    Ok(removed)
}

// ==================== Users ====================

/// Write a user row under its `user_key`.
pub fn store_user(tx: &mut LedgerTx<'_>, user: &UserRecord) -> LedgerResult<()> {
    tx.put_json(user_key(&user.name, &user.public_key), &LedgerDoc::User(user.clone()))
}

pub fn remove_user(tx: &mut LedgerTx<'_>, name: &str, public_key: &str) {
    tx.delete(user_key(name, public_key));
}

/// Look a user up by name. Names are unique, so the first match is the user.
pub fn find_user_by_name(tx: &mut LedgerTx<'_>, name: &str) -> LedgerResult<Option<UserRecord>> {
    let found = tx.query_json::<LedgerDoc>(&Selector::doc("user").name(name))?;
    match found.into_iter().next() {
        Some((_, LedgerDoc::User(user))) => Ok(Some(user)),
        Some((key, other)) => Err(unexpected(&key, "user", &other)),
        None => Ok(None),
    }
}

fn unexpected(key: &str, expected: &str, found: &LedgerDoc) -> LedgerError {
    LedgerError::corrupted(key, format!("expected {} row, found {}", expected, found.doc_name()))
}
