//! Text generation trait

use async_trait::async_trait;
use crate::error::Result;

/// A loaded generation model mapping a prompt to generated text
///
/// Implementations:
/// - `OllamaGenerator`: Local Ollama runtime (llama3.2, phi3, ...)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for a fully built prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
