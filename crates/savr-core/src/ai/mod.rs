//! Pluggable generative model backends
//!
//! # Architecture
//!
//! - `AIBackend` trait: one text generation per rendered prompt
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`,
//!   `AnthropicBackend`, `MockBackend`
//!
//! Backends only move text. Prompt rendering lives in `crate::prompts` and
//! turning the reply into typed results lives in `parsing`.
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, openai_compatible, anthropic, mock). Default: ollama
//! - `OLLAMA_HOST` / `OLLAMA_MODEL`
//! - `OPENAI_COMPATIBLE_HOST` / `OPENAI_COMPATIBLE_MODEL` / `OPENAI_COMPATIBLE_API_KEY`
//! - `ANTHROPIC_HOST` / `ANTHROPIC_MODEL` / `ANTHROPIC_API_KEY`

pub mod anthropic_compat;
mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use anthropic_compat::AnthropicBackend;
pub use mock::{MockBackend, MOCK_INSIGHTS_RESPONSE, MOCK_MEAL_PLAN_RESPONSE};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::prompts::RenderedPrompt;

/// Send one request and decode its JSON body
///
/// Transport failures surface as `Error::Http`; a non-2xx status becomes
/// `Error::Upstream` carrying the status and body.
pub(crate) async fn exchange<T: DeserializeOwned>(request: RequestBuilder, api: &str) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Upstream(format!("{} returned {}: {}", api, status, body)));
    }
    Ok(response.json().await?)
}

/// True when the probe answers with a 2xx status
pub(crate) async fn probe(request: RequestBuilder) -> bool {
    matches!(request.send().await, Ok(resp) if resp.status().is_success())
}

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Generate a completion for one prompt; no streaming, no retries
    async fn generate(&self, prompt: &RenderedPrompt, options: &GenerationOptions)
        -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;

    /// Short backend identifier
    fn backend_name(&self) -> &'static str;

    fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: self.backend_name().to_string(),
            host: self.host().to_string(),
            model: self.model().to_string(),
        }
    }
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (Docker Model Runner, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    Anthropic(AnthropicBackend),
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use. Returns `None`
    /// when the selected backend is missing its required variables.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "anthropic" | "anthropic_compatible" => {
                AnthropicBackend::from_env().map(AIClient::Anthropic)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Anthropic(b) => AIClient::Anthropic(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        options: &GenerationOptions,
    ) -> Result<String> {
        match self {
            AIClient::Ollama(b) => b.generate(prompt, options).await,
            AIClient::OpenAICompatible(b) => b.generate(prompt, options).await,
            AIClient::Anthropic(b) => b.generate(prompt, options).await,
            AIClient::Mock(b) => b.generate(prompt, options).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Anthropic(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Anthropic(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Anthropic(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            AIClient::Ollama(b) => b.backend_name(),
            AIClient::OpenAICompatible(b) => b.backend_name(),
            AIClient::Anthropic(b) => b.backend_name(),
            AIClient::Mock(b) => b.backend_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockOllamaServer;

    fn prompt(user: &str) -> RenderedPrompt {
        RenderedPrompt {
            system: Some("Answer in JSON".to_string()),
            user: user.to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        assert!(AIClient::mock().health_check().await);
        assert!(!AIClient::Mock(MockBackend::unhealthy()).health_check().await);
    }

    #[tokio::test]
    async fn test_mock_canned_reply_follows_prompt() {
        let client = AIClient::mock();
        let options = GenerationOptions::default();

        let plan = client.generate(&prompt("Return weeklyPlan"), &options).await.unwrap();
        assert_eq!(plan, MOCK_MEAL_PLAN_RESPONSE);

        let insights = client.generate(&prompt("Analyze"), &options).await.unwrap();
        assert_eq!(insights, MOCK_INSIGHTS_RESPONSE);
    }

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let mock = MockBackend::failing("offline");
        let client = AIClient::Mock(mock.clone());
        assert!(client
            .generate(&prompt("hello"), &GenerationOptions::default())
            .await
            .is_err());
        assert_eq!(mock.prompts().len(), 1);
        assert_eq!(mock.prompts()[0].user, "hello");
    }

    #[tokio::test]
    async fn test_ollama_against_mock_server() {
        let server = MockOllamaServer::start_with_response("{\"ok\": true}").await;
        let client = AIClient::ollama(&server.url(), "llama3.2");

        assert!(client.health_check().await);
        let reply = client
            .generate(&prompt("hi"), &GenerationOptions::new(100, 0.1))
            .await
            .unwrap();
        assert_eq!(reply, "{\"ok\": true}");
        assert_eq!(client.info().backend, "ollama");
    }

    #[tokio::test]
    async fn test_ollama_unreachable() {
        let client = AIClient::ollama("http://127.0.0.1:9", "llama3.2");
        assert!(!client.health_check().await);
        assert!(client
            .generate(&prompt("hi"), &GenerationOptions::default())
            .await
            .is_err());
    }
}
