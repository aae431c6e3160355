//! Repository access control.
//!
//! The access log is the source of truth: it is append-only, and the current
//! level of every user is whatever the most recent entry naming that user
//! says. The `access` map is derived from it and kept in step on every
//! update.
//!
//! Levels are not a lattice. An owner may move anyone (but themself) to any
//! level, including back down to `NoAccess`. Every new entry must be stamped
//! later than the last one, so append order and timestamp order agree.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Access level of a user on a repository.
///
/// Stored on the ledger as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UserAccess {
    Read = 1,
    ReadWrite = 2,
    Owner = 3,
    /// no entry, or access explicitly revoked
    NoAccess = 4,
}

impl UserAccess {
    /// numeric code used on the wire
    pub fn code(self) -> u8 {
        self as u8
    }

    /// parse from the numeric code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(UserAccess::Read),
            2 => Some(UserAccess::ReadWrite),
            3 => Some(UserAccess::Owner),
            4 => Some(UserAccess::NoAccess),
            _ => None,
        }
    }

    pub fn can_read(self) -> bool {
        matches!(self, UserAccess::Read | UserAccess::ReadWrite | UserAccess::Owner)
    }

    pub fn can_edit(self) -> bool {
        matches!(self, UserAccess::ReadWrite | UserAccess::Owner)
    }

    pub fn is_owner(self) -> bool {
        self == UserAccess::Owner
    }
}

impl From<UserAccess> for u8 {
    fn from(access: UserAccess) -> Self {
        access.code()
    }
}

impl TryFrom<u8> for UserAccess {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        UserAccess::from_code(code).ok_or_else(|| format!("unknown access code: {}", code))
    }
}

impl fmt::Display for UserAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserAccess::Read => write!(f, "read"),
            UserAccess::ReadWrite => write!(f, "readwrite"),
            UserAccess::Owner => write!(f, "owner"),
            UserAccess::NoAccess => write!(f, "none"),
        }
    }
}

/// Parse access level from its code or its name.
impl FromStr for UserAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.trim().parse::<u8>() {
            return UserAccess::try_from(code);
        }
        match s.trim().to_lowercase().as_str() {
            "read" | "r" => Ok(UserAccess::Read),
            "readwrite" | "read_write" | "rw" | "write" => Ok(UserAccess::ReadWrite),
            "owner" => Ok(UserAccess::Owner),
            "none" | "noaccess" | "no_access" | "revoke" => Ok(UserAccess::NoAccess),
            _ => Err(format!("unknown access level: {}", s)),
        }
    }
}

/// one entry of the access audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLog {
    pub authorizer: String,
    pub authorized: String,
    pub timestamp: DateTime<Utc>,
    pub user_access: UserAccess,
}

impl AccessLog {
    pub fn new(
        authorizer: impl Into<String>,
        authorized: impl Into<String>,
        timestamp: DateTime<Utc>,
        user_access: UserAccess,
    ) -> Self {
        Self {
            authorizer: authorizer.into(),
            authorized: authorized.into(),
            timestamp,
            user_access,
        }
    }
}

/// access map plus the log it is derived from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AccessControl {
    access: BTreeMap<String, UserAccess>,
    logs: Vec<AccessLog>,
}

impl AccessControl {
    /// Rebuild from a log. Entries are ordered by timestamp (stable, so
    /// entries sharing a timestamp keep their given order) before replay.
    pub(crate) fn from_logs(mut logs: Vec<AccessLog>) -> Self {
        logs.sort_by_key(|log| log.timestamp);

        let access = logs
            .iter()
            .map(|log| (log.authorized.clone(), log.user_access))
            .collect();

        Self { access, logs }
    }

    pub(crate) fn access(&self) -> &BTreeMap<String, UserAccess> {
        &self.access
    }

    pub(crate) fn logs(&self) -> &[AccessLog] {
        &self.logs
    }

    pub(crate) fn get(&self, user: &str) -> UserAccess {
        self.access.get(user).copied().unwrap_or(UserAccess::NoAccess)
    }

    pub(crate) fn update(
        &mut self,
        authorized: &str,
        user_access: UserAccess,
        authorizer: &str,
        timestamp: DateTime<Utc>,
    ) -> bool {
        if !self.get(authorizer).is_owner() {
            debug!(authorizer, "access change refused: authorizer is not an owner");
            return false;
        }

        if self.access.get(authorized) == Some(&user_access) {
            debug!(authorized, %user_access, "access change refused: level unchanged");
            return false;
        }

        // a user cannot change their own access
        if authorizer == authorized {
            debug!(authorizer, "access change refused: self-service");
            return false;
        }

        // the log is replayed in timestamp order, so it may only grow forward
        if self.logs.last().map_or(false, |last| timestamp <= last.timestamp) {
            debug!(authorized, %timestamp, "access change refused: not newer than the last log entry");
            return false;
        }

        self.logs
            .push(AccessLog::new(authorizer, authorized, timestamp, user_access));
        self.access.insert(authorized.to_string(), user_access);
        true
    }
}
