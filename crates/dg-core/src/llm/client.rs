//! LLM API HTTP Client
//!
//! Supports OpenAI-compatible APIs and the Claude Messages API.

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};

use super::types::*;

/// LLM API client
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: LlmProvider,
    max_tokens: u32,
}

impl LlmClient {
    /// Create a new LLM client. Fails when no API key is configured.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(Error::LlmDisabled)?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            provider: config.provider,
            max_tokens: config.max_tokens,
        })
    }

    /// Client for `config` when a key is set, `None` otherwise
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    /// Single-turn completion: one system prompt, one user message
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(Some(system), &[Message::user(user)]).await
    }

    /// Send a conversation to the model and return its text reply
    pub async fn chat(&self, system: Option<&str>, messages: &[Message]) -> Result<String> {
        let text = match self.provider {
            LlmProvider::Claude => self.send_claude_request(system, messages).await?,
            LlmProvider::OpenAi => self.send_openai_request(system, messages).await?,
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::LlmApi("Empty completion".to_string()));
        }
        Ok(text)
    }

    /// Send request to Claude API
    async fn send_claude_request(&self, system: Option<&str>, messages: &[Message]) -> Result<String> {
        let url = format!("{}/messages", self.base_url);

        debug!("Sending request to Claude API: {}", url);

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.map(str::to_string),
            messages: messages.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Claude API error: {} - {}", status, body);
            return Err(Error::LlmApi(format!("{}: {}", status, body)));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| Error::LlmApi(format!("Failed to parse response: {} - {}", e, body)))?;

        info!(
            "Claude API response: stop_reason={:?}, tokens={}",
            parsed.stop_reason,
            parsed.usage.as_ref().map(|u| u.output_tokens).unwrap_or(0)
        );

        Ok(parsed.text())
    }

    /// Send request to an OpenAI-compatible API
    async fn send_openai_request(&self, system: Option<&str>, messages: &[Message]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!("Sending request to OpenAI-compatible API: {}", url);

        let request = ChatCompletionRequest::new(&self.model, system, messages, self.max_tokens);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("OpenAI API error: {} - {}", status, body);
            return Err(Error::LlmApi(format!("{}: {}", status, body)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::LlmApi(format!("Failed to parse response: {} - {}", e, body)))?;

        info!(
            "OpenAI API response: model={}, tokens={}",
            parsed.model,
            parsed.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0)
        );

        parsed
            .text()
            .ok_or_else(|| Error::LlmApi("Response has no choices".to_string()))
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the provider type
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }
}
