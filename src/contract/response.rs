//! Invocation results.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::contract::error::ContractResult;

/// Successful result of a contract invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A write went through.
    Message(String),
    /// A query result.
    Data(Value),
}

impl Response {
    /// Create a message response.
    pub fn message(message: impl Into<String>) -> Self {
        Response::Message(message.into())
    }

    /// Serialize a query result.
    pub fn data<T: Serialize>(value: &T) -> ContractResult<Self> {
        let value = serde_json::to_value(value).map_err(crate::ledger::LedgerError::from)?;
        Ok(Response::Data(value))
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Response::Data(value) => Some(value),
            Response::Message(_) => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Message(message) => write!(f, "{}", message),
            Response::Data(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                write!(f, "{}", pretty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display() {
        assert_eq!(Response::message("done").to_string(), "done");
        let data = Response::data(&vec!["dev", "main"]).unwrap();
        assert_eq!(data.as_data(), Some(&json!(["dev", "main"])));
        assert!(data.to_string().contains("\"main\""));
    }
}
