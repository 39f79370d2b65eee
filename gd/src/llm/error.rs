//! LLM error types

use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::ApiError { status, .. } => is_retryable_status(*status),
            LlmError::Network(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(
            LlmError::ApiError {
                status: 529,
                message: "Overloaded".to_string()
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 500,
                message: "Server error".to_string()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::ApiError {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );
        assert!(!LlmError::InvalidResponse("garbage".to_string()).is_retryable());
    }
}
