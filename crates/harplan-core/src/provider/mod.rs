//! Chat-completion provider abstraction.
//!
//! The generation driver talks to the model service only through the
//! [`ChatClient`] trait, so a configured client is passed in explicitly and
//! tests can substitute a scripted fake.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::OpenAiClient;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Errors from a single chat-completion call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by provider")]
    RateLimit,

    #[error("invalid or missing API key")]
    InvalidKey,

    #[error("request timed out")]
    Timeout,

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned an empty reply")]
    EmptyReply,
}

/// Parameter dialect of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// `gpt-4o` style: `max_tokens` and `temperature`.
    Chat,
    /// `o1`/`o3`/`o4` style: `max_completion_tokens` and `reasoning_effort`.
    Reasoning,
}

impl ModelFamily {
    pub fn detect(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4") {
            Self::Reasoning
        } else {
            Self::Chat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

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
}

/// One chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Output token limit.
    pub max_tokens: u32,
    /// Ask the provider for a `json_object` response format.
    pub json_response: bool,
}

impl ChatRequest {
    /// The last user message, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    pub api_key: String,
    /// Sent as the `api-version` query parameter when set (Azure).
    pub api_version: Option<String>,
    pub model: String,
    /// Output token budget per request.
    pub token_size: u32,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            api_version: None,
            model: "gpt-4o".to_string(),
            token_size: 4096,
            timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    pub fn family(&self) -> ModelFamily {
        ModelFamily::detect(&self.model)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A chat-completion backend: prompt in, reply text out.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Send one request and return the reply content.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}

// Compile-time assertion: ChatClient must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ChatClient) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoClient;

    #[async_trait]
    impl ChatClient for EchoClient {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
            request
                .prompt()
                .map(str::to_string)
                .ok_or(ProviderError::EmptyReply)
        }
    }

    #[tokio::test]
    async fn client_is_usable_as_trait_object() {
        let client: Box<dyn ChatClient> = Box::new(EchoClient);
        let request = ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
            max_tokens: 10,
            json_response: false,
        };
        assert_eq!(client.name(), "echo");
        assert_eq!(client.complete(&request).await.unwrap(), "hello");
    }

    #[test]
    fn detects_model_family() {
        assert_eq!(ModelFamily::detect("gpt-4o"), ModelFamily::Chat);
        assert_eq!(ModelFamily::detect("gpt-4.1-mini"), ModelFamily::Chat);
        assert_eq!(ModelFamily::detect("o3-mini"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("O1-preview"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::detect("o4-mini"), ModelFamily::Reasoning);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::user("x")).unwrap();
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn default_config() {
        let config = ProviderConfig::default();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.token_size, 4096);
        assert_eq!(config.family(), ModelFamily::Chat);
    }
}
