use thiserror::Error;

use crate::config::prompt::PromptError;
use crate::llm::chat::LlmError;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Unsafe file paths blocked: {}", .0.join(", "))]
    UnsafePaths(Vec<String>),
    #[error("Malformed model response: {reason}")]
    MalformedResponse { reason: String, raw: String },
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Invalid file path: {0}")]
    InvalidPath(String),
    #[error("Version '{0}' not found")]
    VersionNotFound(String),
    #[error("Version record '{id}' is corrupt: {source}")]
    CorruptVersion {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to launch check command: {0}")]
    CheckCommand(String),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
