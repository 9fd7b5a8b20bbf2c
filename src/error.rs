use serde::{Deserialize, Serialize};

use crate::models::{SourceKind, SourceOutcome};

/// Why a single source scan failed. Recorded in the scan outcome and the
/// progress trail; never returned from a search on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Network,
    Timeout,
    Parse,
    /// No client is registered for the descriptor's kind.
    Unsupported,
    /// The scan task panicked.
    Internal,
}

/// Failure of one source client call.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("source did not answer in time")]
    Timeout,

    #[error("unparsable listing: {0}")]
    Parse(String),

    #[error("no client registered for {0:?} sources")]
    Unsupported(SourceKind),

    /// Cancellation acknowledged. Internal signal only.
    #[error("scan cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Errors a caller of `Aggregator::search` can observe.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    InvalidQuery,

    #[error("all {} sources failed", failures.len())]
    AllSourcesFailed { failures: Vec<SourceOutcome> },
}
