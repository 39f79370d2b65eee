//! File skills - read and write files

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::skills::{Skill, SkillError};

/// Read the content of a file
pub struct FileReadSkill;

#[async_trait]
impl Skill for FileReadSkill {
    fn name(&self) -> &'static str {
        "file_read"
    }

    fn description(&self) -> &'static str {
        "Reads the content of a file."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the file to read"
                }
            },
            "required": ["path"]
        })
    }

    fn permissions(&self) -> &'static [&'static str] {
        &["file_read"]
    }

    async fn execute(&self, input: Value) -> Result<Value, SkillError> {
        debug!("FileReadSkill::execute: called");
        let path = input["path"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidInput("path must be a string".to_string()))?;

        if !Path::new(path).is_absolute() {
            return Ok(serde_json::json!({ "content": "", "error": "Path must be absolute" }));
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::json!({ "content": content, "error": "" })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(serde_json::json!({ "content": "", "error": format!("File not found: {path}") }))
            }
            Err(e) => Ok(serde_json::json!({ "content": "", "error": e.to_string() })),
        }
    }
}

/// Write content to a file
pub struct FileWriteSkill;

#[async_trait]
impl Skill for FileWriteSkill {
    fn name(&self) -> &'static str {
        "file_write"
    }

    fn description(&self) -> &'static str {
        "Writes content to a file. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Whether to overwrite if the file exists"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn permissions(&self) -> &'static [&'static str] {
        &["file_write"]
    }

    async fn execute(&self, input: Value) -> Result<Value, SkillError> {
        debug!("FileWriteSkill::execute: called");
        let path = input["path"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidInput("path must be a string".to_string()))?;
        let content = input["content"]
            .as_str()
            .ok_or_else(|| SkillError::InvalidInput("content must be a string".to_string()))?;
        let overwrite = input["overwrite"].as_bool().unwrap_or(false);

        let target = Path::new(path);
        if target.exists() && !overwrite {
            return Ok(serde_json::json!({
                "success": false,
                "path": path,
                "error": "File exists and overwrite is false"
            }));
        }

        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(serde_json::json!({
                    "success": false,
                    "path": path,
                    "error": format!("Failed to create directories: {e}")
                }));
            }
        }

        match tokio::fs::write(target, content).await {
            Ok(()) => Ok(serde_json::json!({
                "success": true,
                "path": path,
                "bytes": content.len(),
                "error": ""
            })),
            Err(e) => Ok(serde_json::json!({
                "success": false,
                "path": path,
                "error": e.to_string()
            })),
        }
    }
}
