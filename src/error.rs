//! Error types for extraction, persistence and the run pipeline.

use thiserror::Error;

use crate::models::RunStatus;

/// Failure of one extraction attempt (one kind and month on one engine).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Timeout or rate-limit/busy response that outlived request-level retries.
    #[error("Transient network error: {0}")]
    Transient(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// No matching table, no headers, no usable download.
    #[error("Structural parse error: {0}")]
    Structural(String),

    /// Page heuristics say the content is rendered by script.
    #[error("Page requires script rendering: {0}")]
    RequiresScript(String),

    #[error("No data found: {0}")]
    NoData(String),

    #[error("Browser error: {0}")]
    Browser(String),

    /// The engine itself cannot start (no Chrome, unreachable DevTools endpoint).
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Whether another attempt for the same kind and month can help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RequiresScript(_) | Self::Unavailable(_))
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Transient(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Persistence collaborator failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Run not found: {0}")]
    NotFound(i64),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid run: {0}")]
    Invalid(String),
}

/// The only errors that escape the orchestrator. Each one fails the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),
    #[error("Run {id} is {status}, only pending runs can be executed")]
    NotPending { id: i64, status: String },
    #[error("Run {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: RunStatus,
        to: RunStatus,
    },
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
