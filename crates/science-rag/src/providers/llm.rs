//! LLM provider trait for generating answers

use async_trait::async_trait;
use crate::error::Result;

/// Trait for chat-completion backends
///
/// Implementations:
/// - `OpenAiCompatClient`: any OpenAI-compatible `/chat/completions` endpoint
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt` as a single user message and return the completion text
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
