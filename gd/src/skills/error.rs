//! Skill error types

use thiserror::Error;

/// Errors that can occur during skill execution
///
/// Most skills encode operational failures (missing file, non-zero
/// exit) in their output value instead; these variants cover failures
/// that prevent producing an output at all.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
