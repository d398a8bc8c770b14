pub mod ai_provider;
pub mod models;
#[cfg(test)]
pub mod stub_provider;

pub use ai_provider::AiProvider;
pub use models::{AiConfig, AiMessage, AiProviderResponse};
