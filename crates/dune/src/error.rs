//! Error type for query execution.

use crate::types::ExecutionState;

/// Errors raised while executing a query. They reach the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum DuneError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Dune API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Execution {execution_id} ended in state {state}: {message}")]
    ExecutionFailed {
        execution_id: String,
        state: ExecutionState,
        message: String,
    },
    #[error("Execution {0} completed without a result set")]
    MissingResult(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for query execution.
pub type DuneResult<T> = Result<T, DuneError>;
