//! Chat completion client for the language-model backend
//!
//! Speaks either the OpenAI-compatible `/chat/completions` endpoint or
//! Ollama's `/api/chat`. Tool calling is not delegated to the backend:
//! the model is instructed to emit a `TOOL:` / `ARGS:` directive in plain
//! text, which [`crate::llm::directive`] picks up.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::metrics::LLM_CALL_TIME;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Error type for chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Parse error: {0} (body: {1})")]
    Parse(serde_json::Error, String),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty response from language model")]
    EmptyResponse,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::AgentUnavailable
    }
}

/// Anything that can turn a conversation into the next assistant message
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier, for logs and metrics
    fn model(&self) -> &str;

    /// Send the full history and return the assistant's reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

/// Which HTTP API the backend exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiFlavor {
    /// `POST {base}/chat/completions`
    #[default]
    OpenAi,
    /// `POST {base}/api/chat`
    Ollama,
}

/// Configuration for [`ChatClient`]
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`
    pub base_url: String,
    /// Bearer token, if the backend wants one
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
    pub flavor: ApiFlavor,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model: "deepseek-r1".to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
            flavor: ApiFlavor::OpenAi,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ReplyMessage,
}

/// Only the text matters; role and extra fields vary between backends
#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<ReplyMessage>,
}

/// HTTP client for the language-model backend
#[derive(Clone)]
pub struct ChatClient {
    config: ChatConfig,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.flavor {
            ApiFlavor::OpenAi => format!("{}/chat/completions", base),
            ApiFlavor::Ollama => format!("{}/api/chat", base),
        }
    }

    fn body(&self, messages: &[ChatMessage]) -> Result<serde_json::Value, ChatError> {
        let value = match self.config.flavor {
            ApiFlavor::OpenAi => serde_json::to_value(CompletionRequest {
                model: &self.config.model,
                messages,
                temperature: self.config.temperature,
            }),
            ApiFlavor::Ollama => serde_json::to_value(OllamaChatRequest {
                model: &self.config.model,
                messages,
                stream: false,
                options: OllamaOptions {
                    temperature: self.config.temperature,
                },
            }),
        };
        value.map_err(|e| ChatError::Parse(e, String::new()))
    }

    fn extract(&self, text: &str) -> Result<String, ChatError> {
        let content = match self.config.flavor {
            ApiFlavor::OpenAi => {
                let response: CompletionResponse = serde_json::from_str(text)
                    .map_err(|e| ChatError::Parse(e, text.to_string()))?;
                response.choices.into_iter().next().and_then(|c| c.message.content)
            }
            ApiFlavor::Ollama => {
                let response: OllamaChatResponse = serde_json::from_str(text)
                    .map_err(|e| ChatError::Parse(e, text.to_string()))?;
                response.message.and_then(|m| m.content)
            }
        };
        content.ok_or(ChatError::EmptyResponse)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let start = Instant::now();

        let mut request = self.client.post(self.endpoint()).json(&self.body(messages)?);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        LLM_CALL_TIME
            .with_label_values(&[self.config.model.as_str()])
            .observe(start.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(ChatError::EmptyResponse);
        }

        let content = self.extract(&text)?;
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            reply_len = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}
