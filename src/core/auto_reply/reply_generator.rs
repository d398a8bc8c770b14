// Reply generator - drafts a short reply to a comment.
//
// This is a total function: whatever goes wrong with the remote call, the
// caller gets a string back. The scheduler has no retry path, so an error
// here would otherwise mean no reply at all.

use crate::core::ai::{AiConfig, AiMessage, AiProvider};
use std::time::Duration;

pub const REPLY_INSTRUCTION: &str = "You are the author of a blog post and a reader has \
commented on it. Write a short, friendly reply to the comment that stays on the topic of the \
post. Reply with the text of the reply only.";

/// Output token cap for generated replies.
pub const REPLY_MAX_TOKENS: u32 = 500;

pub const DEFAULT_REPLY: &str = "Thanks for your comment!";

#[derive(Debug, Clone)]
pub struct AutoReplyConfig {
    pub model: String,
    /// Returned whenever the remote call fails or produces nothing.
    pub fallback_reply: String,
    /// Upper bound on one generation call.
    pub request_timeout: Duration,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            fallback_reply: DEFAULT_REPLY.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct ReplyGenerator<P: AiProvider> {
    provider: P,
    ai_config: AiConfig,
    fallback_reply: String,
    timeout: Duration,
}

impl<P: AiProvider> ReplyGenerator<P> {
    pub fn new(provider: P, config: AutoReplyConfig) -> Self {
        Self {
            provider,
            ai_config: AiConfig {
                model: config.model,
                temperature: Some(0.7),
                max_tokens: Some(REPLY_MAX_TOKENS),
                response_mime_type: None,
            },
            fallback_reply: config.fallback_reply,
            timeout: config.request_timeout,
        }
    }

    fn build_prompt(post_title: &str, post_content: &str, comment_content: &str) -> String {
        format!(
            "Post title: {}\nPost: {}\nComment: {}",
            post_title, post_content, comment_content
        )
    }

    /// Draft a reply. Falls back to the configured default on any failure.
    pub async fn generate(&self, post_title: &str, post_content: &str, comment_content: &str) -> String {
        let messages = [
            AiMessage::system(REPLY_INSTRUCTION),
            AiMessage::user(Self::build_prompt(post_title, post_content, comment_content)),
        ];

        let call = self.provider.chat_complete(&messages, &self.ai_config);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => {
                let reply = response.content.trim();
                if reply.is_empty() {
                    tracing::warn!("Reply generator returned no text, using fallback reply");
                    self.fallback_reply.clone()
                } else {
                    reply.to_string()
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Reply generation failed, using fallback reply: {}", e);
                self.fallback_reply.clone()
            }
            Err(_) => {
                tracing::warn!(
                    "Reply generation timed out after {:?}, using fallback reply",
                    self.timeout
                );
                self.fallback_reply.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::stub_provider::{StubBehavior, StubProvider};

    fn generator(behavior: StubBehavior) -> ReplyGenerator<StubProvider> {
        ReplyGenerator::new(StubProvider::new(behavior), AutoReplyConfig::default())
    }

    #[test]
    fn test_prompt_contains_post_and_comment() {
        let prompt = ReplyGenerator::<StubProvider>::build_prompt("Rust tips", "Use clippy.", "Nice!");
        assert_eq!(prompt, "Post title: Rust tips\nPost: Use clippy.\nComment: Nice!");
    }

    #[tokio::test]
    async fn test_generated_reply_is_trimmed() {
        let generator = generator(StubBehavior::Reply("  Glad you liked it!\n".to_string()));
        assert_eq!(generator.generate("t", "c", "Nice!").await, "Glad you liked it!");
    }

    #[tokio::test]
    async fn test_reply_refers_to_comment() {
        let generator = generator(StubBehavior::EchoLastLine);
        assert_eq!(
            generator.generate("t", "c", "What about lifetimes?").await,
            "Re: Comment: What about lifetimes?"
        );
    }

    #[tokio::test]
    async fn test_provider_error_returns_default() {
        let generator = generator(StubBehavior::Fail);
        assert_eq!(generator.generate("t", "c", "Nice!").await, DEFAULT_REPLY);
    }

    #[tokio::test]
    async fn test_empty_reply_returns_default() {
        let generator = generator(StubBehavior::Reply("   ".to_string()));
        assert_eq!(generator.generate("t", "c", "Nice!").await, DEFAULT_REPLY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_default() {
        let generator = generator(StubBehavior::Hang);
        assert_eq!(generator.generate("t", "c", "Nice!").await, DEFAULT_REPLY);
    }

    #[tokio::test]
    async fn test_custom_fallback() {
        let config = AutoReplyConfig {
            fallback_reply: "Thanks!".to_string(),
            ..Default::default()
        };
        let generator = ReplyGenerator::new(StubProvider::new(StubBehavior::Fail), config);
        assert_eq!(generator.generate("t", "c", "Nice!").await, "Thanks!");
    }
}
