// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implementation of the `AiProvider` trait for Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// - Authentication: API key goes in the `x-goog-api-key` header, never in
//   the URL. reqwest errors print the URL and callers log them.
// - Request format: `contents[]` with nested `parts`; the system prompt goes
//   in the separate top-level `systemInstruction` field.
// - Response format: text at `candidates[0].content.parts[].text`. The body
//   also carries `safetyRatings` with a `probability` label per harm
//   category, which is why the raw body is handed back to the caller.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - Your API key from https://aistudio.google.com/apikey

use crate::core::ai::{
    models::{AiConfig, AiMessage, AiProviderResponse},
    AiProvider,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// A single part of content. Only text parts are used here.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// A message in the conversation.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    /// "user" or "model" (Gemini uses "model" instead of "assistant")
    #[serde(skip_serializing_if = "String::is_empty")]
    role: String,
    parts: Vec<Part>,
}

/// Generation configuration options that control the model's output.
/// See: https://ai.google.dev/api/generate-content#generationconfig
#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    /// Controls randomness. Range: [0.0, 2.0]. Higher = more creative.
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,

    /// Output MIME type, e.g. `application/json` for a structured answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

/// A candidate response from the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    /// Missing when generation stopped for safety reasons.
    #[serde(default)]
    content: Option<Content>,

    /// Why the model stopped generating (e.g., "STOP", "MAX_TOKENS", "SAFETY").
    finish_reason: Option<String>,
}

/// The response from the Gemini generateContent endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    /// List of candidate responses. Absent when the prompt itself was blocked.
    candidates: Option<Vec<Candidate>>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client for interacting with Google's Gemini API.
///
/// One instance is shared by all in-flight requests; `reqwest::Client` is
/// safe to use concurrently.
pub struct GeminiClient {
    /// HTTP client for making requests.
    client: Client,

    /// API key for authentication.
    api_key: String,

    /// Everything before `/{model}:generateContent`.
    base_url: String,
}

impl GeminiClient {
    /// Creates a new Gemini client with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }

    /// Creates a Part with just text content.
    fn text_part(text: String) -> Part {
        Part { text: Some(text) }
    }

    /// Converts our generic `AiMessage` to Gemini's `Content` format.
    ///
    /// "assistant" becomes "model" (Gemini's terminology).
    fn convert_message(msg: &AiMessage) -> Content {
        let role = match msg.role.as_str() {
            "assistant" => "model".to_string(),
            other => other.to_string(),
        };

        Content {
            role,
            parts: vec![Self::text_part(msg.content.clone())],
        }
    }

    fn build_request(messages: &[AiMessage], config: &AiConfig) -> GenerateContentRequest {
        // System instructions are a separate field, not a message.
        let system_instruction = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| Content {
                role: String::new(),
                parts: vec![Self::text_part(m.content.clone())],
            });

        let contents = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(Self::convert_message)
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
                response_mime_type: config.response_mime_type.clone(),
            }),
        }
    }

    /// Concatenated text of the first candidate. Empty when the service
    /// returned no candidate (prompt blocked) or a candidate without content.
    fn extract_text(response: &GenerateContentResponse) -> String {
        let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) else {
            tracing::debug!("Gemini response has no candidates, prompt was likely blocked");
            return String::new();
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" {
                tracing::debug!("Gemini finished with reason {}", reason);
            }
        }

        candidate
            .content
            .as_ref()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        let url = self.endpoint(&config.model);
        let request = Self::build_request(messages, config);

        // Log request for debugging (be careful not to log the API key!)
        tracing::debug!(
            "Gemini request to model {}: {} messages, max tokens {:?}",
            config.model,
            messages.len(),
            config.max_tokens
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;

        if !status.is_success() {
            // Try to parse as Gemini error response for better error messages
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&body) {
                return Err(format!(
                    "Gemini API error ({}): {}",
                    status, error_response.error.message
                )
                .into());
            }

            return Err(format!("Gemini API error: {} - {}", status, body).into());
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        let content = Self::extract_text(&parsed);

        tracing::debug!(
            "Gemini response received: {} chars content, {} chars raw",
            content.len(),
            body.len()
        );

        Ok(AiProviderResponse {
            content,
            raw: Some(body),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const API_KEY: &str = "test-key-do-not-print";

    #[test]
    fn test_endpoint_has_no_key() {
        let client = GeminiClient::new(API_KEY.to_string());
        let url = client.endpoint("gemini-1.5-flash");

        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert!(!url.contains(API_KEY));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_reveal_key() {
        // Nothing listens on port 1, so the request fails before any response.
        let client = GeminiClient::with_base_url(API_KEY.to_string(), "http://127.0.0.1:1".to_string());
        let config = AiConfig {
            model: "gemini-1.5-flash".to_string(),
            ..Default::default()
        };

        let err = client
            .chat_complete(&[AiMessage::user("hello")], &config)
            .await
            .unwrap_err();

        let shown = err.to_string();
        assert!(!shown.contains(API_KEY), "key leaked: {}", shown);
        assert!(!format!("{:?}", err).contains(API_KEY));
    }

    #[test]
    fn test_convert_message_assistant_to_model() {
        let msg = AiMessage {
            role: "assistant".to_string(),
            content: "Hi there!".to_string(),
        };

        let content = GeminiClient::convert_message(&msg);

        // Gemini uses "model" instead of "assistant"
        assert_eq!(content.role, "model");
        assert_eq!(content.parts[0].text, Some("Hi there!".to_string()));
    }

    #[test]
    fn test_system_message_becomes_system_instruction() {
        let messages = vec![AiMessage::system("Answer True or False."), AiMessage::user("hello")];
        let config = AiConfig {
            model: "gemini-1.5-flash".to_string(),
            max_tokens: Some(10),
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(GeminiClient::build_request(&messages, &config)).unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Answer True or False."
        );
        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        // temperature should be skipped because it's None
        assert!(json["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Tha"}, {"text": "nks!"}]},
                "finishReason": "STOP",
                "safetyRatings": [{"category": "HARM_CATEGORY_HARASSMENT", "probability": "NEGLIGIBLE"}]
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();

        assert_eq!(GeminiClient::extract_text(&parsed), "Thanks!");
    }

    #[test]
    fn test_blocked_prompt_yields_empty_text() {
        let body = r#"{
            "promptFeedback": {
                "blockReason": "SAFETY",
                "safetyRatings": [{"category": "HARM_CATEGORY_HARASSMENT", "probability": "HIGH"}]
            }
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();

        assert_eq!(GeminiClient::extract_text(&parsed), "");
    }

    #[test]
    fn test_safety_stop_without_content() {
        let body = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();

        assert_eq!(GeminiClient::extract_text(&parsed), "");
    }
}
