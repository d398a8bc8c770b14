use super::models::{AiConfig, AiMessage, AiProviderResponse};
use async_trait::async_trait;
use std::error::Error;

/// A remote text-generation service (Gemini, OpenRouter, test stubs).
///
/// The moderation and auto-reply code only ever talks to this trait, so the
/// concrete client is chosen once in `main` and injected.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request to the AI provider.
    ///
    /// Returns an `AiProviderResponse` containing the extracted text and the
    /// raw response body.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider>
// This allows the provider to be picked at runtime from configuration.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        (**self).chat_complete(messages, config).await
    }
}
