pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use serde::Serialize;
use std::ops::AddAssign;
use std::sync::Arc;
use thiserror::Error;
use super::{ LlmConfig, LlmType };
use self::anthropic::AnthropicChatClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::{ ChatMessage, Role };

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("{provider} API key is not configured.")]
    MissingApiKey { provider: &'static str },
    #[error("network error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Serde(String),
    #[error("model returned no text content")]
    EmptyCompletion,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Serde(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

/// Upstream chat APIs only know two speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl From<&ChatMessage> for Turn {
    /// Caller `system` turns are inlined as user text: the upstream system
    /// channel is reserved for the policy and context blocks.
    fn from(message: &ChatMessage) -> Self {
        match message.role {
            Role::Assistant => Turn { role: TurnRole::Assistant, content: message.content.clone() },
            Role::User => Turn { role: TurnRole::User, content: message.content.clone() },
            Role::System => Turn {
                role: TurnRole::User,
                content: format!("System: {}", message.content),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemBlock {
    pub text: String,
    pub cacheable: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Vec<SystemBlock>,
    pub turns: Vec<Turn>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Usage,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Anthropic => {
            let specific_client = AnthropicChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
