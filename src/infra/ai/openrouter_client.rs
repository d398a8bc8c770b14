use crate::core::ai::{
    models::{AiConfig, AiMessage, AiProviderResponse},
    AiProvider,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::error::Error;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterClient {
    client: Client,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn build_payload(messages: &[AiMessage], config: &AiConfig) -> serde_json::Value {
        let mut payload = json!({
            "model": config.model,
            "messages": messages,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        });

        if config.response_mime_type.as_deref() == Some("application/json") {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        payload
    }
}

#[async_trait]
impl AiProvider for OpenRouterClient {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        let payload = Self::build_payload(messages, config);

        let response = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(format!("OpenRouter API error: {} - {}", status, text).into());
        }

        let body = response.text().await?;
        let response_json: serde_json::Value = serde_json::from_str(&body)?;

        // Extract content
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or("Failed to parse response content")?
            .to_string();

        Ok(AiProviderResponse {
            content,
            raw: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_hint_maps_to_response_format() {
        let config = AiConfig {
            model: "some/model".to_string(),
            max_tokens: Some(10),
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        };
        let payload = OpenRouterClient::build_payload(&[AiMessage::user("hi")], &config);

        assert_eq!(payload["response_format"]["type"], "json_object");
        assert_eq!(payload["max_tokens"], 10);
        assert_eq!(payload["messages"][0]["role"], "user");
    }

    #[test]
    fn test_plain_request_has_no_response_format() {
        let config = AiConfig {
            model: "some/model".to_string(),
            ..Default::default()
        };
        let payload = OpenRouterClient::build_payload(&[AiMessage::user("hi")], &config);

        assert!(payload.get("response_format").is_none());
    }
}
