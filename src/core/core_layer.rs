// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "auto_reply/mod.rs"]
pub mod auto_reply;

#[path = "blog/mod.rs"]
pub mod blog;

#[path = "moderation/mod.rs"]
pub mod moderation;
