//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API.
//! The default host is OpenRouter; local servers (vLLM, llama-server,
//! LocalAI) work by pointing `OPENAI_COMPATIBLE_HOST` at them.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (default: https://openrouter.ai/api)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: openrouter/auto)
//! - `OPENAI_COMPATIBLE_API_KEY`: Bearer token
//! - `OPENAI_COMPATIBLE_REFERER` / `OPENAI_COMPATIBLE_TITLE`: OpenRouter
//!   attribution headers (optional)
//! - `OPENAI_COMPATIBLE_TIMEOUT_SECS`: Request timeout (optional, none by default)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{ChatCompletionMessage, ChatCompletionRequest, ChatCompletionResponse};
use super::AIBackend;

pub const DEFAULT_HOST: &str = "https://openrouter.ai/api";
pub const DEFAULT_MODEL: &str = "openrouter/auto";

/// OpenAI-compatible backend
///
/// ```rust,ignore
/// // OpenRouter
/// export OPENAI_COMPATIBLE_API_KEY="sk-or-..."
/// export OPENAI_COMPATIBLE_MODEL="xiaomi/mimo-v2-flash:free"
///
/// // Local vLLM
/// export OPENAI_COMPATIBLE_HOST="http://192.168.1.100:8000"
/// export OPENAI_COMPATIBLE_MODEL="meta-llama/Llama-3.2-3B-Instruct"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    referer: Option<String>,
    title: Option<String>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            referer: None,
            title: None,
        }
    }

    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Set the OpenRouter `HTTP-Referer` and `X-Title` headers
    pub fn with_attribution(mut self, referer: Option<String>, title: Option<String>) -> Self {
        self.referer = referer;
        self.title = title;
        self
    }

    /// Apply a whole-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match Client::builder().timeout(timeout).build() {
            Ok(client) => self.http_client = client,
            Err(e) => tracing::warn!(error = %e, "Failed to build HTTP client with timeout"),
        }
        self
    }

    /// Create from environment variables
    ///
    /// Returns None unless `OPENAI_COMPATIBLE_API_KEY` or an explicit
    /// `OPENAI_COMPATIBLE_HOST` is set; the hosted default needs a key.
    pub fn from_env() -> Option<Self> {
        let explicit_host = env_non_empty("OPENAI_COMPATIBLE_HOST");
        let api_key = env_non_empty("OPENAI_COMPATIBLE_API_KEY");
        if explicit_host.is_none() && api_key.is_none() {
            return None;
        }

        let host = explicit_host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let model =
            env_non_empty("OPENAI_COMPATIBLE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut backend = Self::new(&host, &model).with_attribution(
            env_non_empty("OPENAI_COMPATIBLE_REFERER"),
            env_non_empty("OPENAI_COMPATIBLE_TITLE"),
        );
        backend.api_key = api_key;

        if let Some(secs) = env_non_empty("OPENAI_COMPATIBLE_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
        {
            backend = backend.with_timeout(Duration::from_secs(secs));
        }

        Some(backend)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(ref api_key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Some(ref referer) = self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.title {
            builder = builder.header("X-Title", title);
        }
        builder
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatCompletionMessage::system(system),
                ChatCompletionMessage::user(user),
            ],
            temperature: None,
            stream: false,
        };

        debug!(model = %self.model, "Sending chat completion");
        let response = self
            .authorized(
                self.http_client
                    .post(format!("{}/v1/chat/completions", self.base_url))
                    .json(&request),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        if let Some(error) = chat_response.error {
            return Err(Error::Backend(format!("OpenAI API error: {}", error)));
        }

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Backend("No response content from OpenAI API".into()))
    }

    async fn health_check(&self) -> bool {
        match self
            .authorized(self.http_client.get(format!("{}/v1/models", self.base_url)))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockUpstreamServer;

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:12434/", "llama3.2");
        assert_eq!(backend.model(), "llama3.2");
        assert_eq!(backend.host(), "http://localhost:12434");
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend = OpenAICompatibleBackend::with_api_key(DEFAULT_HOST, "gpt-4", "sk-test123")
            .with_attribution(Some("https://example.test".into()), Some("JJM".into()));
        assert_eq!(backend.api_key, Some("sk-test123".to_string()));
        assert_eq!(backend.title.as_deref(), Some("JJM"));
    }

    #[tokio::test]
    async fn test_complete_against_mock_server() {
        let server = MockUpstreamServer::start().await;
        server.set_completion("Halo! 👋").await;

        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "test-model", "sk-x");
        let reply = backend.complete("system", "hai").await.unwrap();
        assert_eq!(reply, "Halo! 👋");

        let requests = server.completion_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["model"], "test-model");
        assert_eq!(requests[0]["messages"][0]["role"], "system");
        assert_eq!(requests[0]["messages"][1]["content"], "hai");
    }

    #[tokio::test]
    async fn test_complete_empty_content_is_error() {
        let server = MockUpstreamServer::start().await;
        server.set_completion("").await;

        let backend = OpenAICompatibleBackend::new(&server.url(), "test-model");
        assert!(backend.complete("system", "hai").await.is_err());
    }

    #[tokio::test]
    async fn test_complete_http_error() {
        let server = MockUpstreamServer::start().await;
        server.fail_completions().await;

        let backend = OpenAICompatibleBackend::new(&server.url(), "test-model");
        let err = backend.complete("system", "hai").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:9", "llama3.2");
        assert!(!backend.health_check().await);
    }
}
