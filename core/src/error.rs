//! Central error type for the Arara terminal.

use arara_data::DataError;
use arara_execution::error::ExecutionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregates all subsystem errors behind one handling interface.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum AraraError {
    /// Execution errors (orders, positions, gateway sessions).
    #[error("Execution: {0}")]
    Execution(#[from] ExecutionError),

    /// Market-data errors (sourcing, parsing).
    #[error("MarketData: {0}")]
    MarketData(#[from] DataError),

    /// Failure while awaiting an async task.
    #[error("JoinError: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for AraraError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Join(format!("{error:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_errors_convert() {
        let execution: AraraError = ExecutionError::validation("bad volume").into();
        assert!(matches!(execution, AraraError::Execution(_)));

        let data: AraraError = DataError::Parse("bad line".to_string()).into();
        assert!(matches!(data, AraraError::MarketData(_)));
    }
}
