//! Node API - a contract over a snapshot-backed ledger, plus a login session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::contract::{Command, Contract, ContractError, Response, UserIdentity};
use crate::ledger::{LedgerError, MemoryLedger};
use crate::node::config::NodeConfig;

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{0}")]
    Contract(#[from] ContractError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("ledger not found: {0}")]
    NotFound(PathBuf),

    #[error("another user is currently logged in, log out first")]
    AlreadyLoggedIn,

    #[error("no user is logged in")]
    NotLoggedIn,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The main node handle.
pub struct Node {
    config: NodeConfig,
    contract: Contract<MemoryLedger>,
    session: Option<UserIdentity>,
}

impl Node {
    /// Open the ledger at the given path, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> NodeResult<Self> {
        Self::open_with_config(NodeConfig::new(path.as_ref()))
    }

    /// Open the ledger with custom configuration.
    pub fn open_with_config(config: NodeConfig) -> NodeResult<Self> {
        let ledger = if config.path.exists() {
            MemoryLedger::load(&config.path)?
        } else if config.create_if_missing {
            MemoryLedger::new()
        } else {
            return Err(NodeError::NotFound(config.path.clone()));
        };

        info!(path = %config.path.display(), keys = ledger.len(), "ledger opened");
        Ok(Self {
            config,
            contract: Contract::new(ledger),
            session: None,
        })
    }

    /// A node that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            config: NodeConfig::default().auto_save(false),
            contract: Contract::new(MemoryLedger::new()),
            session: None,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn contract(&self) -> &Contract<MemoryLedger> {
        &self.contract
    }

    /// Write the ledger snapshot.
    pub fn save(&self) -> NodeResult<()> {
        self.contract.ledger().save(&self.config.path)?;
        Ok(())
    }

    // ==================== Session ====================

    /// Log in as `name`, proving the public key on record.
    pub fn login(&mut self, name: &str, public_key: &str) -> NodeResult<&UserIdentity> {
        if self.session.is_some() {
            return Err(NodeError::AlreadyLoggedIn);
        }
        let identity = self.contract.authenticate(name, public_key)?;
        info!(user = %identity.name, "logged in");
        Ok(self.session.insert(identity))
    }

    pub fn logout(&mut self) -> Option<UserIdentity> {
        self.session.take()
    }

    pub fn whoami(&self) -> Option<&UserIdentity> {
        self.session.as_ref()
    }

    // ==================== Invocation ====================

    /// Run a command as the logged-in user.
    pub fn invoke(&mut self, command: Command, timestamp: DateTime<Utc>) -> NodeResult<Response> {
        let height = self.contract.ledger().height();
        let new_key = match &command {
            Command::ChangePublicKey { public_key } => Some(public_key.clone()),
            _ => None,
        };

        let response = self.contract.invoke(self.session.as_ref(), timestamp, command)?;

        if let (Some(key), Some(session)) = (new_key, self.session.as_mut()) {
            session.public_key = key;
        }

        if self.config.auto_save && self.contract.ledger().height() != height {
            self.save()?;
            debug!(path = %self.config.path.display(), "snapshot written");
        }

        Ok(response)
    }

    /// Run one `function arg...` line. `logIn`, `logOut` and `whoAmI` act on
    /// the session; everything else is a contract command.
    pub fn execute(&mut self, line: &str, timestamp: DateTime<Utc>) -> NodeResult<Response> {
        let mut words = tokenize(line)?;
        if words.is_empty() {
            return Err(NodeError::InvalidInput("empty command".to_string()));
        }
        let function = words.remove(0);
        let args = words;

        match function.as_str() {
            "logIn" => {
                if args.len() != 2 {
                    return Err(ContractError::bad_arguments("logIn", "expecting user name and public key").into());
                }
                let user = self.login(&args[0], &args[1])?;
                Ok(Response::message(format!("User {} has successfully logged in", user.name)))
            }
            "logOut" => match self.logout() {
                Some(_) => Ok(Response::message("Logout successful")),
                None => Err(NodeError::NotLoggedIn),
            },
            "whoAmI" => match self.whoami() {
                Some(user) => Ok(Response::data(user)?),
                None => Err(NodeError::NotLoggedIn),
            },
            _ => {
                let command = Command::parse(&function, &args)?;
                self.invoke(command, timestamp)
            }
        }
    }
}

/// Split a line into words. Single or double quotes group a word, so JSON
/// arguments can be passed as `'{"hash": "c1", ...}'`.
pub fn tokenize(line: &str) -> NodeResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(NodeError::InvalidInput(format!("unterminated {} quote", q)));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
