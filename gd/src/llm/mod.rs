//! LLM client module
//!
//! Provides the completion client used by the planner and the risk
//! judge. Blocking requests only; streaming is not needed here.

mod anthropic;
mod client;
mod error;

pub use anthropic::AnthropicClient;
pub use client::{CompletionRequest, CompletionResponse, LlmClient, Message, Role};
pub use error::LlmError;
