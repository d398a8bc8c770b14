// Automatic replies to comments: draft a reply with a remote model, wait
// the post's configured delay, then post it as the post owner.

pub mod reply_generator;
pub mod reply_scheduler;

pub use reply_generator::{AutoReplyConfig, ReplyGenerator};
pub use reply_scheduler::{auto_reply_applies, ReplyScheduler};
