// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use arara_data::DataError;
use arara_integration::{channel::TxDropped, response::ResponseError, Terminal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution error taxonomy.
///
/// Only [`ExecutionError::InvariantViolation`] is terminal: it aborts the
/// owning engine session. Everything else is reported per item (response
/// envelope or error stream) and processing continues.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum ExecutionError {
    /// Order failed admission (missing instrument, bad volume/price).
    #[error("ValidationError: {0}")]
    Validation(String),

    /// Transport lost or refused; the adapter transitions to disconnected.
    #[error("ConnectionError: {0}")]
    Connection(String),

    /// Malformed tick or wire message; the offending item was dropped.
    #[error("ParseError: {0}")]
    Parse(String),

    /// Query unsupported by this adapter.
    #[error("NotImplementedError: {0}")]
    NotImplemented(String),

    /// Internal bug. Fatal within the current session.
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
}

impl ExecutionError {
    pub fn validation<S: Into<String>>(reason: S) -> Self {
        Self::Validation(reason.into())
    }

    pub fn not_implemented(query: &str) -> Self {
        Self::NotImplemented(query.to_string())
    }

    fn code(&self) -> i32 {
        match self {
            ExecutionError::Validation(_) => 1,
            ExecutionError::Connection(_) => 2,
            ExecutionError::Parse(_) => 3,
            ExecutionError::NotImplemented(_) => 4,
            ExecutionError::InvariantViolation(_) => 5,
        }
    }
}

impl Terminal for ExecutionError {
    fn is_terminal(&self) -> bool {
        matches!(self, ExecutionError::InvariantViolation(_))
    }
}

impl From<DataError> for ExecutionError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::Parse(reason) => Self::Parse(reason),
            DataError::Io(reason) => Self::Connection(reason),
        }
    }
}

impl From<TxDropped> for ExecutionError {
    fn from(_: TxDropped) -> Self {
        Self::Connection("engine channel receiver dropped".to_string())
    }
}

impl From<ExecutionError> for ResponseError {
    fn from(error: ExecutionError) -> Self {
        ResponseError::with_code(error.code(), error.to_string())
    }
}
