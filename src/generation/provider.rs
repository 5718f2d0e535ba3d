//! Chat-completion transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::GenerationError;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// One blocking completion call. Implementations must not retry.
pub trait CompletionClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError>;
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// `timeout: None` keeps reqwest's default.
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, GenerationError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    messages: [WireMessage<'a>; 2],
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let body = WireRequest {
            model: &request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: WireResponse = response
            .json()
            .map_err(|e| GenerationError::Decode(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        debug!(model = %request.model, chars = content.len(), "completion received");
        Ok(content)
    }
}
