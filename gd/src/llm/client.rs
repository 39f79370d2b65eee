//! LLM client trait and request/response types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::LlmError;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

/// A completion response
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Concatenated text content, None if the model produced none
    pub content: Option<String>,
    /// Provider-reported stop reason, if any
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// Text content, trimmed, empty string if none
    pub fn text(&self) -> &str {
        self.content.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Abstraction over an LLM completion provider
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue a blocking completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("yo").role, Role::Assistant);
    }

    #[test]
    fn test_response_text_trims() {
        let resp = CompletionResponse {
            content: Some("  APPROVE \n".to_string()),
            stop_reason: None,
        };
        assert_eq!(resp.text(), "APPROVE");

        let empty = CompletionResponse {
            content: None,
            stop_reason: None,
        };
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
