//! Contract commands.
//!
//! Every operation the contract supports is one [`Command`] variant. Clients
//! that speak the positional calling convention (`function arg1 arg2 ...`,
//! structured arguments as JSON strings) go through [`Command::parse`];
//! clients that speak JSON can deserialize a command directly, tagged by
//! `function`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::contract::error::{ContractError, ContractResult};
use crate::history::{Branch, BranchName, Commit, CommitHash, RepositoryDocument, UserAccess};

/// One contract operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all_fields = "camelCase")]
pub enum Command {
    #[serde(rename = "registerNewUser")]
    RegisterUser { name: String, email: String, public_key: String },

    #[serde(rename = "changePublicKey")]
    ChangePublicKey { public_key: String },

    #[serde(rename = "addNewRepo")]
    AddRepo { repo: RepositoryDocument },

    #[serde(rename = "renameRepo")]
    RenameRepo { author: String, name: String, new_name: String },

    #[serde(rename = "deleteRepo")]
    DeleteRepo { author: String, name: String },

    #[serde(rename = "queryRepo")]
    QueryRepo { author: String, name: String },

    #[serde(rename = "clone")]
    Clone { author: String, name: String },

    #[serde(rename = "addNewBranch")]
    AddBranch { author: String, name: String, branch: Branch },

    #[serde(rename = "renameBranch")]
    RenameBranch {
        author: String,
        name: String,
        branch: BranchName,
        new_branch: BranchName,
    },

    #[serde(rename = "deleteBranch")]
    DeleteBranch { author: String, name: String, branch: BranchName },

    #[serde(rename = "queryBranches")]
    QueryBranches { author: String, name: String },

    #[serde(rename = "queryBranch")]
    QueryBranch { author: String, name: String, branch: BranchName },

    #[serde(rename = "push")]
    Push {
        author: String,
        name: String,
        branch: BranchName,
        commit: Commit,
    },

    #[serde(rename = "pushMultiple")]
    PushMultiple {
        author: String,
        name: String,
        branch: BranchName,
        commits: Vec<Commit>,
    },

    /// Commits newer than `since`, or all of them.
    #[serde(rename = "pull")]
    Pull {
        author: String,
        name: String,
        branch: BranchName,
        #[serde(default)]
        since: Option<CommitHash>,
    },

    #[serde(rename = "checkoutLast")]
    CheckoutLast { author: String, name: String, branch: BranchName },

    #[serde(rename = "queryUser")]
    QueryUser { user_name: String },

    #[serde(rename = "queryUsers")]
    QueryUsers { user_names: Vec<String> },

    #[serde(rename = "updateRepoUserAccess")]
    UpdateUserAccess {
        author: String,
        name: String,
        authorized: String,
        access: UserAccess,
    },

    #[serde(rename = "queryRepoUserAccess")]
    QueryUserAccess { author: String, name: String },
}

impl Command {
    /// Build a command from a function name and positional arguments.
    pub fn parse(function: &str, args: &[String]) -> ContractResult<Self> {
        let args = Args { function, args };

        let command = match function {
            "registerNewUser" => {
                args.expect(3)?;
                Command::RegisterUser {
                    name: args.string(0),
                    email: args.string(1),
                    public_key: args.string(2),
                }
            }
            "changePublicKey" => {
                args.expect(1)?;
                Command::ChangePublicKey { public_key: args.string(0) }
            }
            "addNewRepo" => {
                args.expect(1)?;
                Command::AddRepo { repo: args.json(0)? }
            }
            "renameRepo" => {
                args.expect(3)?;
                Command::RenameRepo {
                    author: args.string(0),
                    name: args.string(1),
                    new_name: args.string(2),
                }
            }
            "deleteRepo" => {
                args.expect(2)?;
                Command::DeleteRepo { author: args.string(0), name: args.string(1) }
            }
            "queryRepo" => {
                args.expect(2)?;
                Command::QueryRepo { author: args.string(0), name: args.string(1) }
            }
            "clone" => {
                args.expect(2)?;
                Command::Clone { author: args.string(0), name: args.string(1) }
            }
            "addNewBranch" => {
                args.expect(3)?;
                Command::AddBranch {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.json(2)?,
                }
            }
            "renameBranch" => {
                args.expect(4)?;
                Command::RenameBranch {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                    new_branch: args.branch(3)?,
                }
            }
            "deleteBranch" => {
                args.expect(3)?;
                Command::DeleteBranch {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                }
            }
            "queryBranches" => {
                args.expect(2)?;
                Command::QueryBranches { author: args.string(0), name: args.string(1) }
            }
            "queryBranch" => {
                args.expect(3)?;
                Command::QueryBranch {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                }
            }
            "push" => {
                args.expect(4)?;
                Command::Push {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                    commit: args.json(3)?,
                }
            }
            "pushMultiple" => {
                args.expect(4)?;
                Command::PushMultiple {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                    commits: args.json(3)?,
                }
            }
            "pull" => {
                // the commit argument may be left out or empty to pull everything
                args.expect_between(3, 4)?;
                let since = match args.args.get(3).map(|s| s.trim()) {
                    None | Some("") => None,
                    Some(hash) => Some(CommitHash::new(hash)?),
                };
                Command::Pull {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                    since,
                }
            }
            "checkoutLast" => {
                args.expect(3)?;
                Command::CheckoutLast {
                    author: args.string(0),
                    name: args.string(1),
                    branch: args.branch(2)?,
                }
            }
            "queryUser" => {
                args.expect(1)?;
                Command::QueryUser { user_name: args.string(0) }
            }
            "queryUsers" => {
                args.expect(1)?;
                Command::QueryUsers { user_names: args.json(0)? }
            }
            "updateRepoUserAccess" => {
                args.expect(4)?;
                let access = args.args[3]
                    .parse::<UserAccess>()
                    .map_err(|e| ContractError::bad_arguments(function, e))?;
                Command::UpdateUserAccess {
                    author: args.string(0),
                    name: args.string(1),
                    authorized: args.string(2),
                    access,
                }
            }
            "queryRepoUserAccess" => {
                args.expect(2)?;
                Command::QueryUserAccess { author: args.string(0), name: args.string(1) }
            }
            _ => return Err(ContractError::UnknownFunction(function.to_string())),
        };

        Ok(command)
    }

    /// The function name this command is invoked by.
    pub fn function_name(&self) -> &'static str {
        match self {
            Command::RegisterUser { .. } => "registerNewUser",
            Command::ChangePublicKey { .. } => "changePublicKey",
            Command::AddRepo { .. } => "addNewRepo",
            Command::RenameRepo { .. } => "renameRepo",
            Command::DeleteRepo { .. } => "deleteRepo",
            Command::QueryRepo { .. } => "queryRepo",
            Command::Clone { .. } => "clone",
            Command::AddBranch { .. } => "addNewBranch",
            Command::RenameBranch { .. } => "renameBranch",
            Command::DeleteBranch { .. } => "deleteBranch",
            Command::QueryBranches { .. } => "queryBranches",
            Command::QueryBranch { .. } => "queryBranch",
            Command::Push { .. } => "push",
            Command::PushMultiple { .. } => "pushMultiple",
            Command::Pull { .. } => "pull",
            Command::CheckoutLast { .. } => "checkoutLast",
            Command::QueryUser { .. } => "queryUser",
            Command::QueryUsers { .. } => "queryUsers",
            Command::UpdateUserAccess { .. } => "updateRepoUserAccess",
            Command::QueryUserAccess { .. } => "queryRepoUserAccess",
        }
    }

    /// Whether the command must be issued by an authenticated user.
    pub fn requires_identity(&self) -> bool {
        !matches!(
            self,
            Command::RegisterUser { .. }
                | Command::QueryUser { .. }
                | Command::QueryUsers { .. }
                | Command::QueryUserAccess { .. }
        )
    }
}

/// positional arguments of one call
struct Args<'a> {
    function: &'a str,
    args: &'a [String],
}

impl Args<'_> {
    fn expect(&self, count: usize) -> ContractResult<()> {
        self.expect_between(count, count)
    }

    fn expect_between(&self, min: usize, max: usize) -> ContractResult<()> {
        let got = self.args.len();
        if got < min || got > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(ContractError::bad_arguments(
                self.function,
                format!("incorrect number of arguments, expecting {}, got {}", expected, got),
            ));
        }
        Ok(())
    }

    fn string(&self, index: usize) -> String {
        self.args[index].clone()
    }

    fn branch(&self, index: usize) -> ContractResult<BranchName> {
        Ok(BranchName::new(self.args[index].as_str())?)
    }

    fn json<T: DeserializeOwned>(&self, index: usize) -> ContractResult<T> {
        serde_json::from_str(&self.args[index])
            .map_err(|e| ContractError::bad_arguments(self.function, format!("argument {}: {}", index + 1, e)))
    }
}
