//! LLM integration for answer generation and grounding checks
//!
//! Features:
//! - `LlmBackend` abstraction with an Ollama chat implementation
//! - Prompt builders for answers and judge verdicts
//! - Adapters implementing the core `AnswerGenerator` and `GroundednessJudge` traits

pub mod adapter;
pub mod backend;
pub mod prompt;

pub use adapter::{LlmAnswerGenerator, LlmGroundednessJudge};
pub use backend::{FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend};
pub use prompt::{Message, PromptBuilder, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for ops_assist_core::Error {
    fn from(err: LlmError) -> Self {
        ops_assist_core::Error::Llm(err.to_string())
    }
}
