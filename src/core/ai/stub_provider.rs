// Scripted AiProvider used by the unit tests in core.

use super::{AiConfig, AiMessage, AiProvider, AiProviderResponse};
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub enum StubBehavior {
    /// Always answer with this text.
    Reply(String),
    /// Answer with this text and raw body.
    ReplyWithRaw { content: String, raw: String },
    /// Echo the last line of the last user message, prefixed with "Re: ".
    EchoLastLine,
    /// Always fail with a transport-like error.
    Fail,
    /// Never answer.
    Hang,
}

pub struct StubProvider {
    behavior: StubBehavior,
    calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(StubBehavior::Reply(text.to_string()))
    }

    /// Shared handle on the call counter, usable after the stub is moved.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl AiProvider for StubProvider {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        _config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            StubBehavior::Reply(text) => Ok(AiProviderResponse {
                content: text.clone(),
                raw: None,
            }),
            StubBehavior::ReplyWithRaw { content, raw } => Ok(AiProviderResponse {
                content: content.clone(),
                raw: Some(raw.clone()),
            }),
            StubBehavior::EchoLastLine => {
                let last_line = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == "user")
                    .and_then(|m| m.content.lines().last())
                    .unwrap_or_default();
                Ok(AiProviderResponse {
                    content: format!("Re: {}", last_line),
                    raw: None,
                })
            }
            StubBehavior::Fail => Err("connection reset by peer".into()),
            StubBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
