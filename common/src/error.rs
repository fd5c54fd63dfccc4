use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Expert reasoning failure: {0}")]
    Reasoning(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Failures that mean "this single verification could not be completed";
    /// the validation pipeline rejects the candidate instead of aborting the
    /// batch when it sees one of these.
    pub fn is_reasoning_failure(&self) -> bool {
        matches!(
            self,
            AppError::Reasoning(_) | AppError::LLMParsing(_) | AppError::OpenAI(_)
        )
    }
}
