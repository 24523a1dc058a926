//! OpenAI-compatible `/chat/completions` client (OpenAI and Azure OpenAI).
//!
//! Uses raw `reqwest`. Azure deployments are reached by pointing
//! `endpoint` at the deployment URL and setting `api_version`; the key is
//! sent both as `api-key` and as a bearer token so either flavour accepts
//! it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatClient, ChatMessage, ChatRequest, ModelFamily, ProviderConfig, ProviderError};

const PING_PROMPT: &str = "Reply with a short greeting for test connection.";
const PING_MAX_TOKENS: u32 = 100;
const CHAT_TEMPERATURE: f32 = 0.3;
const REASONING_EFFORT: &str = "low";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat client bound to one endpoint, key and model.
pub struct OpenAiClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Connectivity check: a tiny prompt with a 100-token limit.
    pub async fn ping(&self) -> Result<String, ProviderError> {
        let request = ChatRequest {
            messages: vec![ChatMessage::user(PING_PROMPT)],
            max_tokens: PING_MAX_TOKENS,
            json_response: false,
        };
        self.complete(&request).await
    }

    fn build_body<'a>(&'a self, request: &'a ChatRequest) -> WireRequest<'a> {
        let reasoning = self.config.family() == ModelFamily::Reasoning;
        WireRequest {
            model: &self.config.model,
            messages: &request.messages,
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
            max_tokens: (!reasoning).then_some(request.max_tokens),
            max_completion_tokens: reasoning.then_some(request.max_tokens),
            temperature: (!reasoning).then_some(CHAT_TEMPERATURE),
            reasoning_effort: reasoning.then_some(REASONING_EFFORT),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        let key = self.config.api_key.trim();
        if key.is_empty() {
            Err(ProviderError::InvalidKey)
        } else {
            Ok(key)
        }
    }
}

fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    use reqwest::StatusCode;
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::InvalidKey,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        other => ProviderError::Http {
            status: other.as_u16(),
            body,
        },
    }
}

fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let key = self.require_key()?;
        let body = self.build_body(request);

        let mut call = self
            .client
            .post(self.url())
            .header("api-key", key)
            .bearer_auth(key)
            .json(&body);
        if let Some(version) = self.config.api_version.as_deref().filter(|v| !v.is_empty()) {
            call = call.query(&[("api-version", version)]);
        }

        let resp = call.send().await.map_err(send_error)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let data: WireResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::EmptyReply)?;

        debug!(model = %self.config.model, chars = content.len(), "received completion");
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
