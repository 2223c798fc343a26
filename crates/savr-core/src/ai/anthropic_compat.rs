//! Anthropic Messages API backend
//!
//! Talks to any server exposing `/v1/messages` in the Anthropic format, the
//! hosted API or a local compatibility layer.
//!
//! # Configuration
//!
//! Environment variables:
//! - `ANTHROPIC_HOST`: Server URL (default: https://api.anthropic.com)
//! - `ANTHROPIC_MODEL`: Model name (required)
//! - `ANTHROPIC_API_KEY`: API key (optional for local servers)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompts::RenderedPrompt;

use super::types::GenerationOptions;
use super::{exchange, probe, AIBackend};

const DEFAULT_HOST: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: text.into(),
        }
    }
}

/// Content block types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Anthropic Messages API response
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Text blocks joined, or `None` when the reply has no text
    pub fn text(&self) -> Option<String> {
        let texts: Vec<_> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

#[derive(Clone)]
pub struct AnthropicBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AnthropicBackend {
    pub fn new(base_url: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(String::from),
        }
    }

    /// Create a new backend with a different model (same host)
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: model.to_string(),
            api_key: self.api_key.clone(),
        }
    }

    /// Create from environment; requires `ANTHROPIC_MODEL`
    pub fn from_env() -> Option<Self> {
        let model = std::env::var("ANTHROPIC_MODEL").ok()?;
        let host = std::env::var("ANTHROPIC_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        Some(Self::new(&host, &model, api_key.as_deref()))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("anthropic-version", API_VERSION);
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl AIBackend for AnthropicBackend {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        options: &GenerationOptions,
    ) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens,
            messages: vec![Message::user(prompt.user.clone())],
            system: prompt.system.clone(),
            temperature: options.temperature,
        };

        debug!(model = %self.model, "Sending messages request");

        let request = self
            .request(
                self.http_client
                    .post(format!("{}/v1/messages", self.base_url))
                    .timeout(options.timeout),
            )
            .json(&request);
        let body: MessagesResponse = exchange(request, "Messages API").await?;

        debug!(stop_reason = ?body.stop_reason, "Messages response received");
        body.text()
            .ok_or_else(|| Error::Upstream("Messages response had no text".into()))
    }

    async fn health_check(&self) -> bool {
        probe(self.request(self.http_client.get(format!("{}/v1/models", self.base_url)))).await
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }

    fn backend_name(&self) -> &'static str {
        "anthropic"
    }
}
