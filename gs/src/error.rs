//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {kind}/{id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to parse record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True if this error means the record simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
