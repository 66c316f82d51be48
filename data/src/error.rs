// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors generated while sourcing or parsing market data.
///
/// Carried as owned strings so the error stays `Clone + Serialize` across
/// event streams.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    /// Malformed tick line or field. The offending item is dropped and
    /// processing continues.
    #[error("ParseError: {0}")]
    Parse(String),

    /// Tick source could not be opened or read.
    #[error("IoError: {0}")]
    Io(String),
}

impl From<std::io::Error> for DataError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}
