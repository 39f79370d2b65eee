//! Anthropic-style Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::is_retryable_status;
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use crate::config::LlmConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Anthropic Messages API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, "AnthropicClient::from_config: called");
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LlmError::InvalidResponse(format!("API key not found. Set the {} environment variable.", config.api_key_env))
        })?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": request.messages,
        })
    }

    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "AnthropicClient::parse_response: called");
        let text: String = api_response
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            stop_reason: api_response.stop_reason,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(message_count = request.messages.len(), "AnthropicClient::complete: called");
        let body = self.build_request_body(&request);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let mut attempt = 0;
        loop {
            let response = self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await;

            let err = match response {
                Ok(resp) if resp.status().is_success() => {
                    let api_response: AnthropicResponse = resp.json().await.map_err(LlmError::Network)?;
                    return Ok(self.parse_response(api_response));
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let message = resp.text().await.unwrap_or_default();
                    LlmError::ApiError { status, message }
                }
                Err(e) => LlmError::Network(e),
            };

            let retryable = match &err {
                LlmError::ApiError { status, .. } => is_retryable_status(*status),
                LlmError::Network(_) => true,
                _ => false,
            };
            if !retryable || attempt >= MAX_RETRIES {
                return Err(err);
            }

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
            warn!(error = %err, attempt, ?backoff, "AnthropicClient::complete: retrying");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

/// Raw Messages API response shape
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn client() -> AnthropicClient {
        AnthropicClient {
            model: "test-model".to_string(),
            api_key: "key".to_string(),
            base_url: "http://localhost".to_string(),
            http: Client::new(),
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_request_body_caps_max_tokens() {
        let request = CompletionRequest {
            system_prompt: "sys".to_string(),
            messages: vec![Message::user("hi")],
            max_tokens: 99_999,
        };
        let body = client().build_request_body(&request);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_response_concatenates_text_blocks() {
        let api_response: AnthropicResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "APPROVE"}, {"type": "text", "text": "D"}], "stop_reason": "end_turn"}"#,
        )
        .unwrap();
        let parsed = client().parse_response(api_response);
        assert_eq!(parsed.content.as_deref(), Some("APPROVED"));
        assert_eq!(parsed.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn test_parse_empty_response() {
        let api_response: AnthropicResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        let parsed = client().parse_response(api_response);
        assert!(parsed.content.is_none());
    }
}
