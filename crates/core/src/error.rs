//! Error taxonomy shared by every crate in the workspace

use thiserror::Error;

/// Core error type
///
/// Crate-local errors (`RagError`, `LlmError`, `ConfigError`) convert into this
/// type so collaborators behind trait objects can report failures uniformly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// One side of hybrid retrieval did not answer in time
    #[error("Retrieval timeout: {0}")]
    RetrievalTimeout(String),

    /// No usable index for this query
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    /// Judge failure; recovered by failing open
    #[error("Grader failure: {0}")]
    GraderFailure(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the caller can expect a degraded but valid result after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::RetrievalTimeout(_) | Error::GraderFailure(_))
    }
}

/// Result alias using the core error type
pub type Result<T> = std::result::Result<T, Error>;
