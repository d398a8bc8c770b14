use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request shape shared by every provider.
#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub model: String,
    pub temperature: Option<f32>,
    /// Output token cap. Keeps cost and latency bounded.
    pub max_tokens: Option<u32>,
    /// Structured-output hint (`application/json`). Ignored by providers
    /// that have no equivalent.
    pub response_mime_type: Option<String>,
}

/// Response from an AI provider.
#[derive(Debug, Clone, Default)]
pub struct AiProviderResponse {
    /// The text the model produced.
    pub content: String,

    /// The undecoded response body, when the provider has one.
    /// Gemini includes per-category safety ratings (`"probability": "HIGH"`)
    /// here, which the toxicity classifier scans as a secondary signal.
    pub raw: Option<String>,
}

impl AiProviderResponse {
    /// Text to scan for harm labels: the raw body if present, else the content.
    pub fn raw_or_content(&self) -> &str {
        self.raw.as_deref().unwrap_or(&self.content)
    }
}
