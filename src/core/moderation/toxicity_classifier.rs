// Toxicity classifier - asks a remote model whether text is harmful.
//
// Any failure (transport, service, timeout) is treated as "not harmful".
// Moderation fails open so a flaky classifier never blocks content creation.

use crate::core::ai::{AiConfig, AiMessage, AiProvider, AiProviderResponse};
use std::time::Duration;

pub const CLASSIFIER_INSTRUCTION: &str = "You are a content moderator for a blog. \
Decide whether the user's text is harmful: hateful, harassing, threatening, sexually explicit \
or otherwise toxic. Answer strictly with a single word, True if it is harmful or False if it \
is not.";

/// Output token cap for classification requests.
pub const CLASSIFIER_MAX_TOKENS: u32 = 10;

pub struct ToxicityClassifier<P: AiProvider> {
    provider: P,
    config: AiConfig,
    harm_labels: Vec<String>,
    timeout: Duration,
}

impl<P: AiProvider> ToxicityClassifier<P> {
    /// `model` is forwarded to the provider; the token cap and the
    /// structured-output hint are fixed here.
    pub fn new(provider: P, model: String, harm_labels: Vec<String>, timeout: Duration) -> Self {
        Self {
            provider,
            config: AiConfig {
                model,
                temperature: Some(0.0),
                max_tokens: Some(CLASSIFIER_MAX_TOKENS),
                response_mime_type: Some("application/json".to_string()),
            },
            harm_labels,
            timeout,
        }
    }

    /// Returns true if the text is harmful. Never fails.
    pub async fn classify(&self, text: &str) -> bool {
        let messages = [AiMessage::system(CLASSIFIER_INSTRUCTION), AiMessage::user(text)];

        let call = self.provider.chat_complete(&messages, &self.config);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => {
                let harmful = self.is_harmful_response(&response);
                tracing::debug!(
                    "Classifier answered {:?} ({} chars raw), harmful: {}",
                    response.content,
                    response.raw.as_ref().map(|r| r.len()).unwrap_or(0),
                    harmful
                );
                harmful
            }
            Ok(Err(e)) => {
                tracing::warn!("Toxicity classifier failed, allowing content: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Toxicity classifier timed out after {:?}, allowing content",
                    self.timeout
                );
                false
            }
        }
    }

    /// Either signal alone marks the response harmful:
    /// the answer contains "true" (any case), or the raw response carries
    /// one of the configured harm labels.
    fn is_harmful_response(&self, response: &AiProviderResponse) -> bool {
        let says_true = response.content.to_lowercase().contains("true");

        let raw = response.raw_or_content();
        let has_label = self
            .harm_labels
            .iter()
            .any(|label| !label.is_empty() && raw.contains(label.as_str()));

        says_true || has_label
    }
}
