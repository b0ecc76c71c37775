//! Error types for chatloop.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! model gateway, knowledge, prompt and tool errors.

use thiserror::Error;

/// Unified error type for chatloop.
///
/// Library functions return `Result<T, AppError>`; the drivers decide
/// whether an error ends the run or only the current turn.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors, including missing credentials
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model gateway errors (network, auth, malformed request or response)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Document store and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Tool loop errors. Unknown tools are not reported here; they become
    /// error results handed back to the model.
    #[error("Tool error: {0}")]
    Tool(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error should end the whole run rather than one turn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Io(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
