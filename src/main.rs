// This is the entry point of the blog backend.
//
// **Architecture Overview:**
// - `core/` = Business logic (moderation, auto-replies, blog rules)
// - `infra/` = Implementations of core traits (SQLite, AI provider APIs)
// - `console/` = Line-delimited JSON adapter over stdin/stdout
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Serve requests until stdin closes
// 4. Give pending automatic replies a chance to land

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "console/console_layer.rs"]
mod console;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::console::Console;
use crate::core::ai::AiProvider;
use crate::core::auto_reply::{AutoReplyConfig, ReplyGenerator, ReplyScheduler};
use crate::core::blog::{BlogService, BlogStore};
use crate::core::moderation::{ContentModerator, ModerationConfig};
use crate::infra::ai::{GeminiClient, OpenRouterClient};
use crate::infra::blog::{InMemoryBlogStore, SqliteBlogStore};
use anyhow::{bail, Context};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_DATABASE_URL: &str = "data/blog.db";
/// `DATABASE_URL` value selecting the non-persistent store.
const IN_MEMORY_DATABASE: &str = "memory";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-chat-v3.1:free";

/// Split a comma separated variable into trimmed, non-empty items.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

/// Build the configured remote model client. Returns the client and the
/// model to ask for.
fn build_provider(provider: &str) -> anyhow::Result<(Box<dyn AiProvider>, String)> {
    let model = std::env::var("AI_MODEL").ok();

    match provider {
        "gemini" => {
            let api_key = std::env::var("GEMINI_API_KEY")
                .context("Missing GEMINI_API_KEY environment variable!")?;
            Ok((
                Box::new(GeminiClient::new(api_key)),
                model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            ))
        }
        "openrouter" => {
            let api_key = std::env::var("OPENROUTER_API_KEY")
                .context("Missing OPENROUTER_API_KEY environment variable!")?;
            Ok((
                Box::new(OpenRouterClient::new(api_key)),
                model.unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            ))
        }
        other => bail!("Unknown AI_PROVIDER {:?}, expected gemini or openrouter", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // stdout carries responses, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let provider_name = std::env::var("AI_PROVIDER")
        .unwrap_or_else(|_| "gemini".to_string())
        .to_lowercase();
    let request_timeout = Duration::from_secs(
        std::env::var("AI_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10),
    );

    let defaults = ModerationConfig::default();
    let moderation_config = ModerationConfig {
        profanity_forbidden: std::env::var("PROFANITY_FORBIDDEN")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.profanity_forbidden),
        harm_category_labels: env_list("HARM_CATEGORY_LABELS")
            .unwrap_or(defaults.harm_category_labels),
        extra_profane_words: env_list("PROFANITY_EXTRA_WORDS").unwrap_or_default(),
        request_timeout,
    };

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    // One client per consumer so neither holds the other up
    let (classifier_client, model) = build_provider(&provider_name)?;
    let (generator_client, _) = build_provider(&provider_name)?;
    tracing::info!("Using {} model {}", provider_name, model);

    let moderator =
        ContentModerator::from_config(classifier_client, model.clone(), &moderation_config);

    let mut reply_config = AutoReplyConfig {
        model,
        request_timeout,
        ..Default::default()
    };
    if let Ok(fallback) = std::env::var("AUTO_REPLY_FALLBACK") {
        reply_config.fallback_reply = fallback;
    }
    let generator = Arc::new(ReplyGenerator::new(generator_client, reply_config));

    if database_url == IN_MEMORY_DATABASE {
        tracing::warn!("Using the in-memory store, nothing will be persisted");
        serve(Arc::new(InMemoryBlogStore::new()), moderator, generator).await
    } else {
        let store = SqliteBlogStore::new(&database_url)
            .await
            .with_context(|| format!("Failed to open blog database at {}", database_url))?;
        serve(Arc::new(store), moderator, generator).await
    }
}

/// Serve stdin against `store` until input ends, then let pending
/// auto-replies land unless interrupted.
async fn serve<S: BlogStore + 'static>(
    store: Arc<S>,
    moderator: ContentModerator<Box<dyn AiProvider>>,
    generator: Arc<ReplyGenerator<Box<dyn AiProvider>>>,
) -> anyhow::Result<()> {
    let replies = ReplyScheduler::spawn(Arc::clone(&store), generator);
    let service = Arc::new(BlogService::new(store, moderator, replies));
    let console = Console::new(Arc::clone(&service));

    tracing::info!("Blog backend ready, reading requests from stdin");
    let input = tokio::io::BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = console.run(input, tokio::io::stdout()) => {
            let answered = result?;
            tracing::info!("Input closed after {} requests", answered);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(
                "Interrupted, {} pending auto-replies will be lost",
                service.replies().in_flight()
            );
            return Ok(());
        }
    }

    let pending = service.replies().in_flight();
    if pending > 0 {
        tracing::info!("Waiting for {} pending auto-replies", pending);
        tokio::select! {
            _ = service.replies().wait_idle() => {
                tracing::info!("All auto-replies delivered");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(
                    "Interrupted, {} pending auto-replies will be lost",
                    service.replies().in_flight()
                );
            }
        }
    }

    Ok(())
}
