//! Fetch skill - retrieve content from a URL

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::skills::{Skill, SkillError};

/// Response body size limit in bytes
const MAX_BODY_BYTES: usize = 1_000_000;

/// Fetch content from a URL over HTTP
pub struct FetchSkill;

#[async_trait]
impl Skill for FetchSkill {
    fn name(&self) -> &'static str {
        "http_fetch"
    }

    fn description(&self) -> &'static str {
        "Fetches the content of a URL over HTTP GET."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch (http or https)"
                }
            },
            "required": ["url"]
        })
    }

    fn permissions(&self) -> &'static [&'static str] {
        &["net_access"]
    }

    async fn execute(&self, input: Value) -> Result<Value, SkillError> {
        let url = input["url"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidInput("url must be a string".to_string()))?;

        debug!(%url, "FetchSkill::execute: called");

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(serde_json::json!({
                "status": 0,
                "body": "",
                "error": "URL must start with http:// or https://"
            }));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                return Ok(serde_json::json!({
                    "status": 0,
                    "body": "",
                    "error": format!("Failed to fetch URL: {e}")
                }));
            }
        };

        let status = response.status().as_u16();
        let mut body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return Ok(serde_json::json!({
                    "status": status,
                    "body": "",
                    "error": format!("Failed to read response: {e}")
                }));
            }
        };
        if body.len() > MAX_BODY_BYTES {
            body.truncate(MAX_BODY_BYTES);
        }

        let error = if (200..300).contains(&status) {
            String::new()
        } else {
            format!("HTTP error: {status}")
        };

        Ok(serde_json::json!({
            "status": status,
            "body": body,
            "error": error
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_url() {
        let out = FetchSkill
            .execute(serde_json::json!({ "url": "ftp://example.com" }))
            .await
            .unwrap();
        assert!(out["error"].as_str().unwrap().contains("http"));
    }

    #[tokio::test]
    async fn test_missing_url_is_invalid_input() {
        let err = FetchSkill.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, SkillError::InvalidInput(_)));
    }
}
