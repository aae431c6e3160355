//! The contract: one handler per [`Command`].
//!
//! Every invocation runs in its own [`LedgerTx`]. A handler loads what it
//! needs, asks the history engine for a verdict, and writes rows back only on
//! success; the transaction is committed only when the handler returned `Ok`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::contract::command::Command;
use crate::contract::error::{ContractError, ContractResult};
use crate::contract::identity::UserIdentity;
use crate::contract::response::Response;
use crate::history::{
    Branch, BranchName, Commit, CommitHash, HistoryError, Repository, RepositoryDocument, UserAccess,
};
use crate::ledger::records::{self, UserRecord};
use crate::ledger::{LedgerStore, LedgerTx};

/// Dispatches commands against a ledger.
pub struct Contract<L: LedgerStore> {
    ledger: L,
}

impl<L: LedgerStore> Contract<L> {
    /// Create a contract over the given ledger.
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Look a user up and check the public key they claim.
    pub fn authenticate(&self, name: &str, public_key: &str) -> ContractResult<UserIdentity> {
        let mut tx = LedgerTx::begin(&self.ledger, DateTime::<Utc>::default());
        let user = records::find_user_by_name(&mut tx, name)?
            .ok_or_else(|| ContractError::UserNotFound(name.to_string()))?;
        tx.rollback();

        if user.public_key != public_key {
            return Err(ContractError::AuthenticationFailed(name.to_string()));
        }
        Ok(user.into())
    }

    /// Run one command on behalf of `caller`, stamped with `timestamp`.
    pub fn invoke(
        &self,
        caller: Option<&UserIdentity>,
        timestamp: DateTime<Utc>,
        command: Command,
    ) -> ContractResult<Response> {
        let function = command.function_name();
        let mut tx = LedgerTx::begin(&self.ledger, timestamp);
        debug!(tx = %tx.id(), function, caller = caller.map(|c| c.name.as_str()), "invoke");

        let result = self.dispatch(&mut tx, caller, command);
        match result {
            Ok(response) => {
                if tx.write_count() > 0 {
                    tx.commit()?;
                } else {
                    tx.rollback();
                }
                Ok(response)
            }
            Err(e) => {
                if e.is_rejection() {
                    debug!(function, reason = %e, "invocation rejected");
                } else {
                    debug!(function, error = %e, "invocation failed");
                }
                tx.rollback();
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        tx: &mut LedgerTx<'_>,
        caller: Option<&UserIdentity>,
        command: Command,
    ) -> ContractResult<Response> {
        let caller = if command.requires_identity() {
            let caller = caller.ok_or(ContractError::NotAuthenticated)?;
            verify_caller(tx, caller)?;
            Some(caller)
        } else {
            None
        };
        let user = || caller.ok_or(ContractError::NotAuthenticated);

        match command {
            Command::RegisterUser { name, email, public_key } => register_user(tx, name, email, public_key),
            Command::ChangePublicKey { public_key } => change_public_key(tx, user()?, public_key),
            Command::AddRepo { repo } => add_repo(tx, user()?, repo),
            Command::RenameRepo { author, name, new_name } => rename_repo(tx, user()?, &author, &name, new_name),
            Command::DeleteRepo { author, name } => delete_repo(tx, user()?, &author, &name),
            Command::QueryRepo { author, name } => query_repo(tx, &author, &name),
            Command::Clone { author, name } => clone(tx, user()?, &author, &name),
            Command::AddBranch { author, name, branch } => add_branch(tx, user()?, &author, &name, branch),
            Command::RenameBranch {
                author,
                name,
                branch,
                new_branch,
            } => rename_branch(tx, user()?, &author, &name, &branch, new_branch),
            Command::DeleteBranch { author, name, branch } => delete_branch(tx, user()?, &author, &name, &branch),
            Command::QueryBranches { author, name } => query_branches(tx, user()?, &author, &name),
            Command::QueryBranch { author, name, branch } => query_branch(tx, user()?, &author, &name, &branch),
            Command::Push {
                author,
                name,
                branch,
                commit,
            } => push(tx, user()?, &author, &name, &branch, vec![commit]),
            Command::PushMultiple {
                author,
                name,
                branch,
                commits,
            } => push(tx, user()?, &author, &name, &branch, commits),
            Command::Pull {
                author,
                name,
                branch,
                since,
            } => pull(tx, user()?, &author, &name, &branch, since.as_ref()),
            Command::CheckoutLast { author, name, branch } => checkout_last(tx, user()?, &author, &name, &branch),
            Command::QueryUser { user_name } => query_user(tx, &user_name),
            Command::QueryUsers { user_names } => query_users(tx, &user_names),
            Command::UpdateUserAccess {
                author,
                name,
                authorized,
                access,
            } => update_user_access(tx, user()?, &author, &name, &authorized, access),
            Command::QueryUserAccess { author, name } => query_user_access(tx, &author, &name),
        }
    }
}

/// The caller must be a registered user holding the key they present.
fn verify_caller(tx: &mut LedgerTx<'_>, caller: &UserIdentity) -> ContractResult<()> {
    let record = records::find_user_by_name(tx, &caller.name)?
        .ok_or_else(|| ContractError::UserNotFound(caller.name.clone()))?;
    if record.public_key != caller.public_key {
        return Err(ContractError::AuthenticationFailed(caller.name.clone()));
    }
    Ok(())
}

fn load(tx: &mut LedgerTx<'_>, author: &str, name: &str) -> ContractResult<Repository> {
    records::load_repository(tx, author, name)?.ok_or_else(|| ContractError::repo_not_found(author, name))
}

fn require_read(repo: &Repository, user: &UserIdentity) -> ContractResult<()> {
    if !repo.can_read(&user.name) {
        return Err(ContractError::denied(&user.name, format!("read {}", repo.name())));
    }
    Ok(())
}

fn require_edit(repo: &Repository, user: &UserIdentity) -> ContractResult<()> {
    if !repo.can_edit(&user.name) {
        return Err(ContractError::denied(&user.name, format!("edit {}", repo.name())));
    }
    Ok(())
}

fn require_owner(repo: &Repository, user: &UserIdentity, action: &str) -> ContractResult<()> {
    if !repo.is_owner(&user.name) {
        return Err(ContractError::denied(&user.name, format!("{} {}", action, repo.name())));
    }
    Ok(())
}

fn branch_of<'r>(repo: &'r Repository, branch: &BranchName) -> ContractResult<&'r Branch> {
    repo.branch(branch)
        .ok_or_else(|| HistoryError::BranchNotFound(branch.clone()).into())
}

/// Append commits and turn a refusal into a rejection.
fn apply_commits(repo: &mut Repository, branch: &BranchName, commits: Vec<Commit>) -> ContractResult<usize> {
    match repo.add_commits(commits, branch, false) {
        Ok(applied) => Ok(applied),
        Err(HistoryError::CommitNotApplied { hash, .. }) => Err(ContractError::Rejected(format!(
            "commit {} could not be added to {}",
            hash, branch
        ))),
        Err(e) => Err(e.into()),
    }
}

// ==================== Users ====================

fn register_user(tx: &mut LedgerTx<'_>, name: String, email: String, public_key: String) -> ContractResult<Response> {
    if name.trim().is_empty() {
        return Err(ContractError::bad_arguments("registerNewUser", "user name cannot be empty"));
    }
    if records::find_user_by_name(tx, &name)?.is_some() {
        return Err(ContractError::UserExists(name));
    }

    records::store_user(tx, &UserRecord::new(&name, email, public_key))?;
    info!(user = %name, "user registered");
    Ok(Response::message(format!("User {} has successfully been created", name)))
}

fn change_public_key(tx: &mut LedgerTx<'_>, caller: &UserIdentity, public_key: String) -> ContractResult<Response> {
    records::remove_user(tx, &caller.name, &caller.public_key);
    let updated = UserIdentity::new(&caller.name, &caller.email, public_key);
    records::store_user(tx, &updated.to_record())?;

    info!(user = %caller.name, "public key changed");
    Ok(Response::message(format!("Public key changed for user {}", caller.name)))
}

fn query_user(tx: &mut LedgerTx<'_>, name: &str) -> ContractResult<Response> {
    let user = records::find_user_by_name(tx, name)?.ok_or_else(|| ContractError::UserNotFound(name.to_string()))?;
    Response::data(&UserIdentity::from(user))
}

/// Unknown names are skipped.
fn query_users(tx: &mut LedgerTx<'_>, names: &[String]) -> ContractResult<Response> {
    let mut users = Vec::new();
    for name in names {
        if let Some(user) = records::find_user_by_name(tx, name)? {
            users.push(UserIdentity::from(user));
        }
    }
    Response::data(&users)
}

// ==================== Repositories ====================

fn add_repo(tx: &mut LedgerTx<'_>, caller: &UserIdentity, mut doc: RepositoryDocument) -> ContractResult<Response> {
    if doc.author != caller.name {
        return Err(ContractError::denied(&caller.name, format!("create a repo for {}", doc.author)));
    }
    if doc.name.trim().is_empty() {
        return Err(ContractError::bad_arguments("addNewRepo", "repo name cannot be empty"));
    }
    if records::find_repository_row(tx, &doc.author, &doc.name)?.is_some() {
        return Err(ContractError::RepoExists {
            author: doc.author,
            name: doc.name,
        });
    }

    // the creator starts as sole owner, whatever the document claims
    doc.access_logs.clear();
    let repo = Repository::from_document(doc, tx.timestamp());
    records::store_repository(tx, &repo)?;

    info!(repo = %repo.name(), author = %repo.author(), "repo created");
    Ok(Response::message("The repo has been added successfully"))
}

fn rename_repo(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    new_name: String,
) -> ContractResult<Response> {
    let mut repo = load(tx, author, name)?;
    require_owner(&repo, caller, "rename")?;

    if new_name.trim().is_empty() {
        return Err(ContractError::bad_arguments("renameRepo", "repo name cannot be empty"));
    }
    if records::find_repository_row(tx, author, &new_name)?.is_some() {
        return Err(ContractError::RepoExists {
            author: author.to_string(),
            name: new_name,
        });
    }

    // every row is keyed by the repo id, which changes with the name
    records::remove_repository(tx, author, name)?;
    repo.rename(new_name);
    records::store_repository(tx, &repo)?;

    info!(from = name, to = %repo.name(), author, "repo renamed");
    Ok(Response::message(format!("The repo has been renamed to {}", repo.name())))
}

fn delete_repo(tx: &mut LedgerTx<'_>, caller: &UserIdentity, author: &str, name: &str) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    require_owner(&repo, caller, "delete")?;

    let removed = records::remove_repository(tx, author, name)?;
    info!(repo = name, author, rows = removed, "repo deleted");
    Ok(Response::message("The repo has been deleted successfully"))
}

fn query_repo(tx: &mut LedgerTx<'_>, author: &str, name: &str) -> ContractResult<Response> {
    let record =
        records::find_repository_row(tx, author, name)?.ok_or_else(|| ContractError::repo_not_found(author, name))?;
    Response::data(&record)
}

fn clone(tx: &mut LedgerTx<'_>, caller: &UserIdentity, author: &str, name: &str) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    require_read(&repo, caller)?;
    Response::data(&repo)
}

// ==================== Branches ====================

fn add_branch(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: Branch,
) -> ContractResult<Response> {
    let mut repo = load(tx, author, name)?;
    require_edit(&repo, caller)?;

    if !repo.valid_branch(&branch) {
        return Err(ContractError::Rejected(format!("branch {} already exists", branch.name())));
    }

    // carried commits go through validation like any push
    let branch_name = branch.name().clone();
    let commits: Vec<Commit> = branch.commits_in_order().into_iter().cloned().collect();
    repo.add_branch(Branch::new(branch_name.clone()), false);
    apply_commits(&mut repo, &branch_name, commits)?;

    records::store_branch(tx, author, name, branch_of(&repo, &branch_name)?)?;
    records::store_repository_row(tx, &repo)?;

    info!(repo = name, branch = %branch_name, "branch added");
    Ok(Response::message(format!("The branch {} has been added", branch_name)))
}

fn rename_branch(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: &BranchName,
    new_branch: BranchName,
) -> ContractResult<Response> {
    let mut repo = load(tx, author, name)?;
    require_edit(&repo, caller)?;

    let old = branch_of(&repo, branch)?.clone();
    if !repo.update_branch_name(branch, new_branch.clone())? {
        return Err(ContractError::Rejected(format!(
            "branch {} cannot be renamed to {}",
            branch, new_branch
        )));
    }

    records::remove_branch(tx, author, name, &old);
    records::store_branch(tx, author, name, branch_of(&repo, &new_branch)?)?;

    info!(repo = name, from = %branch, to = %new_branch, "branch renamed");
    Ok(Response::message(format!("The branch {} has been renamed to {}", branch, new_branch)))
}

fn delete_branch(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: &BranchName,
) -> ContractResult<Response> {
    let mut repo = load(tx, author, name)?;
    require_edit(&repo, caller)?;

    let old = repo.branch(branch).cloned();
    if !repo.delete_branch(branch)? {
        return Err(ContractError::Rejected(format!("branch {} cannot be deleted", branch)));
    }

    if let Some(old) = old {
        records::remove_branch(tx, author, name, &old);
    }

    info!(repo = name, %branch, "branch deleted");
    Ok(Response::message(format!("The branch {} has been deleted", branch)))
}

fn query_branches(tx: &mut LedgerTx<'_>, caller: &UserIdentity, author: &str, name: &str) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    require_read(&repo, caller)?;
    Response::data(&repo.branch_names())
}

fn query_branch(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: &BranchName,
) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    require_read(&repo, caller)?;
    Response::data(branch_of(&repo, branch)?)
}

// ==================== Commits ====================

/// A push to a branch that does not exist yet creates it.
fn push(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: &BranchName,
    commits: Vec<Commit>,
) -> ContractResult<Response> {
    let mut repo = load(tx, author, name)?;
    require_edit(&repo, caller)?;

    if commits.is_empty() {
        return Err(ContractError::Rejected("could not find any commits".to_string()));
    }

    let created = !repo.branch_exists(branch);
    if created {
        repo.add_branch(Branch::new(branch.clone()), false);
    }

    let pushed = commits.clone();
    let applied = apply_commits(&mut repo, branch, commits)?;

    if created {
        records::store_branch(tx, author, name, branch_of(&repo, branch)?)?;
    } else {
        records::store_commits(tx, author, name, branch, &pushed)?;
    }
    records::store_repository_row(tx, &repo)?;

    let merges = pushed.iter().filter(|c| c.is_merge()).count();
    if let Some(head) = pushed.last() {
        info!(
            repo = name,
            %branch,
            applied,
            merges,
            created,
            head = head.hash.short(),
            summary = head.summary(),
            "push accepted"
        );
    }
    Ok(Response::message(format!("{} commit(s) added to {}", applied, branch)))
}

fn pull(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: &BranchName,
    since: Option<&CommitHash>,
) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    require_read(&repo, caller)?;
    let commits = branch_of(&repo, branch)?.commits_after(since)?;
    Response::data(&commits)
}

/// The newest commit's hash, or null for an empty branch.
fn checkout_last(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    branch: &BranchName,
) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    require_read(&repo, caller)?;
    let last = branch_of(&repo, branch)?.last_commit().map(|c| c.hash.clone());
    Response::data(&last)
}

// ==================== Access ====================

fn update_user_access(
    tx: &mut LedgerTx<'_>,
    caller: &UserIdentity,
    author: &str,
    name: &str,
    authorized: &str,
    access: UserAccess,
) -> ContractResult<Response> {
    let mut repo = load(tx, author, name)?;

    if !repo.update_access(authorized, access, &caller.name, tx.timestamp()) {
        return Err(ContractError::Rejected(format!(
            "access of {} was not set to {}",
            authorized, access
        )));
    }

    if let Some(log) = repo.access_logs().last() {
        records::store_access_log(tx, author, name, log)?;
    }
    Ok(Response::message("Access to the repo has been updated successfully"))
}

fn query_user_access(tx: &mut LedgerTx<'_>, author: &str, name: &str) -> ContractResult<Response> {
    let repo = load(tx, author, name)?;
    Response::data(&repo.access_logs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    const T0: i64 = 1_700_000_000_000;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn commit(h: &str, parents: &[&str], ms: i64) -> Commit {
        Commit::builder(CommitHash::new(h).unwrap(), ts(ms))
            .author("alice", "alice@example.com")
            .message(format!("commit {}", h))
            .parents(parents.iter().map(|p| CommitHash::new(*p).unwrap()).collect())
            .build()
    }

    fn main_branch() -> BranchName {
        BranchName::main()
    }

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    struct Fixture {
        contract: Contract<MemoryLedger>,
        alice: UserIdentity,
        bob: UserIdentity,
    }

    impl Fixture {
        /// alice and bob registered, alice owns `proj`
        fn new() -> Self {
            let contract = Contract::new(MemoryLedger::new());
            let alice = UserIdentity::new("alice", "alice@example.com", "pk-alice");
            let bob = UserIdentity::new("bob", "bob@example.com", "pk-bob");

            for user in [&alice, &bob] {
                contract
                    .invoke(
                        None,
                        ts(T0 - 100),
                        Command::RegisterUser {
                            name: user.name.clone(),
                            email: user.email.clone(),
                            public_key: user.public_key.clone(),
                        },
                    )
                    .unwrap();
            }

            let fixture = Self { contract, alice, bob };
            let doc = Repository::new("proj", "alice", "QmDir", ts(T0 - 50)).to_document();
            fixture.run(&fixture.alice, T0 - 50, Command::AddRepo { repo: doc }).unwrap();
            fixture
        }

        fn run(&self, user: &UserIdentity, ms: i64, command: Command) -> ContractResult<Response> {
            self.contract.invoke(Some(user), ts(ms), command)
        }

        fn push(&self, user: &UserIdentity, branch: BranchName, commit: Commit) -> ContractResult<Response> {
            self.run(
                user,
                commit.timestamp_millis(),
                Command::Push {
                    author: "alice".into(),
                    name: "proj".into(),
                    branch,
                    commit,
                },
            )
        }

        fn clone_repo(&self) -> Value {
            let response = self
                .run(
                    &self.alice,
                    T0 + 1_000,
                    Command::Clone {
                        author: "alice".into(),
                        name: "proj".into(),
                    },
                )
                .unwrap();
            response.as_data().unwrap().clone()
        }

        fn grant(&self, by: &UserIdentity, to: &str, access: UserAccess, ms: i64) -> ContractResult<Response> {
            self.run(
                by,
                ms,
                Command::UpdateUserAccess {
                    author: "alice".into(),
                    name: "proj".into(),
                    authorized: to.into(),
                    access,
                },
            )
        }
    }

    #[test]
    fn test_authenticate() {
        let f = Fixture::new();
        assert_eq!(f.contract.authenticate("alice", "pk-alice").unwrap(), f.alice);
        assert!(matches!(
            f.contract.authenticate("alice", "wrong"),
            Err(ContractError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            f.contract.authenticate("carol", "k"),
            Err(ContractError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_register_twice() {
        let f = Fixture::new();
        let result = f.contract.invoke(
            None,
            ts(T0),
            Command::RegisterUser {
                name: "alice".into(),
                email: "other@example.com".into(),
                public_key: "pk2".into(),
            },
        );
        assert!(matches!(result, Err(ContractError::UserExists(_))));
    }

    #[test]
    fn test_identity_required_and_verified() {
        let f = Fixture::new();
        let cmd = Command::Clone {
            author: "alice".into(),
            name: "proj".into(),
        };
        assert!(matches!(
            f.contract.invoke(None, ts(T0), cmd.clone()),
            Err(ContractError::NotAuthenticated)
        ));

        let impostor = UserIdentity::new("alice", "alice@example.com", "stolen");
        assert!(matches!(
            f.run(&impostor, T0, cmd),
            Err(ContractError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_scenario_create_and_first_commit() {
        let f = Fixture::new();
        let repo = f.clone_repo();
        assert_eq!(repo["branches"]["main"]["commits"], json!({}));
        assert_eq!(repo["access"], json!({"alice": 3}));

        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();
        assert_eq!(f.clone_repo()["commitHashes"], json!(["c1"]));
    }

    #[test]
    fn test_scenario_ordering_and_duplicates() {
        let f = Fixture::new();
        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();

        let early = f.push(&f.alice, main_branch(), commit("c2", &["c1"], T0 - 1));
        assert!(matches!(early, Err(ContractError::Rejected(_))));

        f.push(&f.alice, main_branch(), commit("c2", &["c1"], T0 + 1)).unwrap();
        let again = f.push(&f.alice, main_branch(), commit("c2", &["c1"], T0 + 1));
        assert!(matches!(again, Err(ContractError::Rejected(_))));

        assert_eq!(f.clone_repo()["commitHashes"], json!(["c1", "c2"]));
    }

    #[test]
    fn test_missing_parent_is_stale_view() {
        let f = Fixture::new();
        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();
        let err = f.push(&f.alice, main_branch(), commit("c2", &["ghost"], T0 + 1)).unwrap_err();
        assert!(err.is_stale_view());
    }

    #[test]
    fn test_scenario_access() {
        let f = Fixture::new();
        f.grant(&f.alice, "bob", UserAccess::ReadWrite, T0).unwrap();

        let logs = f
            .run(
                &f.bob,
                T0 + 1,
                Command::QueryUserAccess {
                    author: "alice".into(),
                    name: "proj".into(),
                },
            )
            .unwrap();
        assert_eq!(logs.as_data().unwrap().as_array().unwrap().len(), 2);

        // self-service
        let result = f.grant(&f.bob, "bob", UserAccess::Owner, T0 + 2);
        assert!(matches!(result, Err(ContractError::Rejected(_))));

        // bob can push now
        f.push(&f.bob, main_branch(), commit("c1", &[], T0 + 3)).unwrap();
    }

    #[test]
    fn test_backdated_revoke_is_rejected() {
        let f = Fixture::new();
        let clone = Command::Clone {
            author: "alice".into(),
            name: "proj".into(),
        };
        f.grant(&f.alice, "bob", UserAccess::ReadWrite, T0 + 1_000).unwrap();

        let backdated = f.grant(&f.alice, "bob", UserAccess::NoAccess, T0 + 500);
        assert!(matches!(backdated, Err(ContractError::Rejected(_))));
        f.run(&f.bob, T0 + 1_100, clone.clone()).unwrap();

        // the same revoke stamped after the grant sticks across reloads
        f.grant(&f.alice, "bob", UserAccess::NoAccess, T0 + 1_200).unwrap();
        assert!(matches!(
            f.run(&f.bob, T0 + 1_300, clone),
            Err(ContractError::PermissionDenied { .. })
        ));
        let repo = f.clone_repo();
        assert_eq!(repo["access"]["bob"], 4);
        assert_eq!(repo["accessLogs"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_edit_requires_access() {
        let f = Fixture::new();
        let result = f.push(&f.bob, main_branch(), commit("c1", &[], T0));
        assert!(matches!(result, Err(ContractError::PermissionDenied { .. })));

        f.grant(&f.alice, "bob", UserAccess::Read, T0).unwrap();
        let result = f.push(&f.bob, main_branch(), commit("c1", &[], T0 + 1));
        assert!(matches!(result, Err(ContractError::PermissionDenied { .. })));
        f.run(
            &f.bob,
            T0 + 2,
            Command::QueryBranches {
                author: "alice".into(),
                name: "proj".into(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_scenario_main_protection() {
        let f = Fixture::new();
        let rename = |from: BranchName, to: BranchName| Command::RenameBranch {
            author: "alice".into(),
            name: "proj".into(),
            branch: from,
            new_branch: to,
        };

        let result = f.run(&f.alice, T0, rename(main_branch(), branch("dev")));
        assert!(matches!(result, Err(ContractError::Rejected(_))));

        f.run(
            &f.alice,
            T0,
            Command::AddBranch {
                author: "alice".into(),
                name: "proj".into(),
                branch: Branch::new(branch("dev")),
            },
        )
        .unwrap();
        let result = f.run(&f.alice, T0, rename(branch("dev"), main_branch()));
        assert!(matches!(result, Err(ContractError::Rejected(_))));

        let result = f.run(
            &f.alice,
            T0,
            Command::DeleteBranch {
                author: "alice".into(),
                name: "proj".into(),
                branch: main_branch(),
            },
        );
        assert!(matches!(result, Err(ContractError::Rejected(_))));
    }

    #[test]
    fn test_branch_lifecycle() {
        let f = Fixture::new();
        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();

        // pushing to a missing branch creates it
        f.push(&f.alice, branch("dev"), commit("d1", &["c1"], T0 + 1)).unwrap();
        let repo = f.clone_repo();
        assert!(repo["branches"]["dev"]["commits"]["d1"].is_object());

        f.run(
            &f.alice,
            T0 + 2,
            Command::RenameBranch {
                author: "alice".into(),
                name: "proj".into(),
                branch: branch("dev"),
                new_branch: branch("feature"),
            },
        )
        .unwrap();
        let repo = f.clone_repo();
        assert!(repo["branches"].get("dev").is_none());
        assert!(repo["branches"]["feature"]["commits"]["d1"].is_object());

        f.run(
            &f.alice,
            T0 + 3,
            Command::DeleteBranch {
                author: "alice".into(),
                name: "proj".into(),
                branch: branch("feature"),
            },
        )
        .unwrap();
        let repo = f.clone_repo();
        assert!(repo["branches"].get("feature").is_none());
        // the hash outlives its branch and still counts as a known parent
        assert_eq!(repo["commitHashes"], json!(["c1", "d1"]));
        f.push(&f.alice, main_branch(), commit("m1", &["c1", "d1"], T0 + 4)).unwrap();
        let unknown = f.push(&f.alice, main_branch(), commit("m2", &["m1", "ghost"], T0 + 5));
        assert!(matches!(unknown, Err(ContractError::Rejected(_))));
    }

    #[test]
    fn test_add_branch_validates_carried_commits() {
        let f = Fixture::new();
        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();

        let bad = Branch::with_commits(branch("import"), vec![commit("x1", &["c1"], T0 + 1), commit("x2", &["ghost"], T0 + 2)]);
        let result = f.run(
            &f.alice,
            T0 + 3,
            Command::AddBranch {
                author: "alice".into(),
                name: "proj".into(),
                branch: bad,
            },
        );
        assert!(result.is_err());
        // nothing was written
        assert!(f.clone_repo()["branches"].get("import").is_none());

        let good = Branch::with_commits(branch("import"), vec![commit("x2", &["x1"], T0 + 2), commit("x1", &["c1"], T0 + 1)]);
        f.run(
            &f.alice,
            T0 + 3,
            Command::AddBranch {
                author: "alice".into(),
                name: "proj".into(),
                branch: good,
            },
        )
        .unwrap();
        assert_eq!(f.clone_repo()["commitHashes"], json!(["c1", "x1", "x2"]));
    }

    #[test]
    fn test_push_multiple_partial_failure_writes_nothing() {
        let f = Fixture::new();
        let commits = vec![commit("c1", &[], T0), commit("c2", &["c1"], T0 + 1), commit("c3", &["c2"], T0 + 1)];
        let result = f.run(
            &f.alice,
            T0 + 2,
            Command::PushMultiple {
                author: "alice".into(),
                name: "proj".into(),
                branch: main_branch(),
                commits,
            },
        );
        assert!(matches!(result, Err(ContractError::Rejected(_))));
        assert_eq!(f.clone_repo()["commitHashes"], json!([]));

        let empty = f.run(
            &f.alice,
            T0 + 2,
            Command::PushMultiple {
                author: "alice".into(),
                name: "proj".into(),
                branch: main_branch(),
                commits: vec![],
            },
        );
        assert!(matches!(empty, Err(ContractError::Rejected(_))));
    }

    #[test]
    fn test_pull_and_checkout() {
        let f = Fixture::new();
        let commits = vec![commit("c1", &[], T0), commit("c2", &["c1"], T0 + 10), commit("c3", &["c2"], T0 + 20)];
        f.run(
            &f.alice,
            T0 + 30,
            Command::PushMultiple {
                author: "alice".into(),
                name: "proj".into(),
                branch: main_branch(),
                commits,
            },
        )
        .unwrap();

        let pull = |since: Option<&str>| {
            f.run(
                &f.alice,
                T0 + 40,
                Command::Pull {
                    author: "alice".into(),
                    name: "proj".into(),
                    branch: main_branch(),
                    since: since.map(|s| CommitHash::new(s).unwrap()),
                },
            )
        };

        let all = pull(None).unwrap();
        assert_eq!(all.as_data().unwrap().as_array().unwrap().len(), 3);
        let newer = pull(Some("c1")).unwrap();
        let hashes: Vec<&str> = newer
            .as_data()
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["hash"].as_str().unwrap())
            .collect();
        assert_eq!(hashes, vec!["c2", "c3"]);
        assert!(pull(Some("nope")).unwrap_err().is_stale_view());

        let last = f
            .run(
                &f.alice,
                T0 + 40,
                Command::CheckoutLast {
                    author: "alice".into(),
                    name: "proj".into(),
                    branch: main_branch(),
                },
            )
            .unwrap();
        assert_eq!(last.as_data(), Some(&json!("c3")));
    }

    #[test]
    fn test_repo_lifecycle() {
        let f = Fixture::new();
        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();
        f.grant(&f.alice, "bob", UserAccess::ReadWrite, T0 + 1).unwrap();

        // only owners rename or delete
        let rename = Command::RenameRepo {
            author: "alice".into(),
            name: "proj".into(),
            new_name: "renamed".into(),
        };
        assert!(matches!(
            f.run(&f.bob, T0 + 2, rename.clone()),
            Err(ContractError::PermissionDenied { .. })
        ));
        f.run(&f.alice, T0 + 2, rename).unwrap();

        let old = f.run(
            &f.alice,
            T0 + 3,
            Command::QueryRepo {
                author: "alice".into(),
                name: "proj".into(),
            },
        );
        assert!(matches!(old, Err(ContractError::RepoNotFound { .. })));

        let cloned = f
            .run(
                &f.bob,
                T0 + 3,
                Command::Clone {
                    author: "alice".into(),
                    name: "renamed".into(),
                },
            )
            .unwrap();
        let cloned = cloned.as_data().unwrap();
        assert_eq!(cloned["name"], "renamed");
        assert_eq!(cloned["commitHashes"], json!(["c1"]));
        assert_eq!(cloned["accessLogs"].as_array().unwrap().len(), 2);

        f.run(
            &f.alice,
            T0 + 4,
            Command::DeleteRepo {
                author: "alice".into(),
                name: "renamed".into(),
            },
        )
        .unwrap();
        // two user rows remain
        assert_eq!(f.contract.ledger().len(), 2);
    }

    #[test]
    fn test_add_repo_rules() {
        let f = Fixture::new();
        let doc = Repository::new("proj", "alice", "", ts(T0)).to_document();
        assert!(matches!(
            f.run(&f.alice, T0, Command::AddRepo { repo: doc.clone() }),
            Err(ContractError::RepoExists { .. })
        ));

        // bob cannot create repos in alice's name
        let mut other = doc.clone();
        other.name = "other".into();
        assert!(matches!(
            f.run(&f.bob, T0, Command::AddRepo { repo: other }),
            Err(ContractError::PermissionDenied { .. })
        ));

        // smuggled access logs are ignored
        let mut mine = Repository::new("mine", "bob", "", ts(T0)).to_document();
        mine.access_logs
            .push(crate::history::AccessLog::new("bob", "mallory", ts(T0), UserAccess::Owner));
        f.run(&f.bob, T0, Command::AddRepo { repo: mine }).unwrap();
        let logs = f
            .run(
                &f.bob,
                T0 + 1,
                Command::QueryUserAccess {
                    author: "bob".into(),
                    name: "mine".into(),
                },
            )
            .unwrap();
        assert_eq!(logs.as_data().unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_change_public_key() {
        let f = Fixture::new();
        f.run(&f.alice, T0, Command::ChangePublicKey { public_key: "pk-new".into() })
            .unwrap();

        assert!(f.contract.authenticate("alice", "pk-alice").is_err());
        let alice = f.contract.authenticate("alice", "pk-new").unwrap();
        assert_eq!(alice.email, "alice@example.com");

        let users = f
            .contract
            .invoke(
                None,
                ts(T0),
                Command::QueryUsers {
                    user_names: vec!["alice".into(), "ghost".into(), "bob".into()],
                },
            )
            .unwrap();
        assert_eq!(users.as_data().unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_pushes_conflict() {
        let f = Fixture::new();
        f.push(&f.alice, main_branch(), commit("c1", &[], T0)).unwrap();

        // two invocations interleaved by hand over the same ledger state
        let mut first = LedgerTx::begin(f.contract.ledger(), ts(T0 + 1));
        let mut second = LedgerTx::begin(f.contract.ledger(), ts(T0 + 1));
        push(&mut first, &f.alice, "alice", "proj", &main_branch(), vec![commit("c2", &["c1"], T0 + 1)]).unwrap();
        push(&mut second, &f.alice, "alice", "proj", &main_branch(), vec![commit("c3", &["c1"], T0 + 1)]).unwrap();

        first.commit().unwrap();
        let err = ContractError::from(second.commit().unwrap_err());
        assert!(err.is_retryable());
    }
}
