// Console layer - line-delimited JSON over any async reader/writer.
//
// main wires this to stdin/stdout; tests feed it byte slices.

#[path = "commands.rs"]
pub mod commands;

use crate::core::ai::AiProvider;
use crate::core::blog::{BlogService, BlogStore};
use commands::{handle_line, Response};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub struct Console<S: BlogStore, P: AiProvider> {
    service: Arc<BlogService<S, P>>,
}

impl<S: BlogStore, P: AiProvider> Console<S, P> {
    pub fn new(service: Arc<BlogService<S, P>>) -> Self {
        Self { service }
    }

    /// Serve requests until the input ends. Returns the number of requests
    /// answered. Blank lines are skipped.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> anyhow::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut answered = 0;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = handle_line(self.service.as_ref(), line).await;
            if let Response::Error { error, kind } = &response {
                tracing::debug!(kind, "Request failed: {}", error);
            }

            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            output.write_all(encoded.as_bytes()).await?;
            output.flush().await?;
            answered += 1;
        }

        Ok(answered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::stub_provider::{StubBehavior, StubProvider};
    use crate::core::auto_reply::{AutoReplyConfig, ReplyGenerator, ReplyScheduler};
    use crate::core::moderation::{ContentModerator, ModerationConfig};
    use crate::infra::blog::InMemoryBlogStore;
    use serde_json::Value;

    fn console() -> Console<InMemoryBlogStore, StubProvider> {
        let store = Arc::new(InMemoryBlogStore::new());
        let moderator = ContentModerator::from_config(
            StubProvider::replying("False"),
            "test".to_string(),
            &ModerationConfig::default(),
        );
        let generator = ReplyGenerator::new(
            StubProvider::new(StubBehavior::Reply("Thanks for reading!".to_string())),
            AutoReplyConfig::default(),
        );
        let replies = ReplyScheduler::spawn(Arc::clone(&store), Arc::new(generator));
        Console::new(Arc::new(BlogService::new(store, moderator, replies)))
    }

    async fn run(console: &Console<InMemoryBlogStore, StubProvider>, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        console.run(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request_line() {
        let console = console();
        let input = concat!(
            r#"{"actor": {"user_id": 1}, "command": "create_post", "title": "Hello", "content": "World", "auto_reply": true}"#,
            "\n\n",
            r#"{"actor": {"user_id": 2}, "command": "create_comment", "post_id": 1, "content": "Nice one"}"#,
            "\n",
            "not json\n",
            r#"{"actor": {"user_id": 2}, "command": "delete_post", "post_id": 1}"#,
            "\n",
        );

        let responses = run(&console, input).await;
        assert_eq!(responses.len(), 4);

        assert_eq!(responses[0]["ok"]["title"], "Hello");
        assert_eq!(responses[0]["ok"]["auto_reply"]["enabled"], true);
        assert_eq!(responses[1]["ok"]["post_id"], 1);
        assert_eq!(responses[2]["kind"], "bad_request");
        assert_eq!(responses[3]["kind"], "forbidden");
    }

    #[tokio::test]
    async fn test_reply_is_listed_after_draining() {
        let console = console();
        let setup = concat!(
            r#"{"actor": {"user_id": 1}, "command": "create_post", "title": "Hello", "content": "World", "auto_reply": true}"#,
            "\n",
            r#"{"actor": {"user_id": 2}, "command": "create_comment", "post_id": 1, "content": "Nice one"}"#,
            "\n",
        );
        run(&console, setup).await;
        console.service.replies().wait_idle().await;

        let listed = run(
            &console,
            r#"{"actor": {"user_id": 2}, "command": "list_comments", "post_id": 1}"#,
        )
        .await;
        let comments = listed[0]["ok"].as_array().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1]["content"], "Thanks for reading!");
        assert_eq!(comments[1]["author_id"], 1);
        assert_eq!(comments[1]["parent_id"], 1);
    }
}
