//! Caller identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ledger::UserRecord;

/// Public identity of a user, passed explicitly into every call that acts on
/// someone's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub name: String,
    pub email: String,
    pub public_key: String,
}

impl UserIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            public_key: public_key.into(),
        }
    }

    /// the ledger row for this identity
    pub fn to_record(&self) -> UserRecord {
        UserRecord::new(&self.name, &self.email, &self.public_key)
    }
}

impl From<UserRecord> for UserIdentity {
    fn from(record: UserRecord) -> Self {
        Self {
            name: record.name,
            email: record.email,
            public_key: record.public_key,
        }
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
