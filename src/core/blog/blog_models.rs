// Blog domain models.
//
// Plain data: the store decides how these are persisted, the service decides
// who may see them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who is making a request. Authentication happens outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Per-post automatic reply settings.
///
/// Read once when a comment is created; later edits don't affect replies
/// that are already scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoReplyPolicy {
    pub enabled: bool,
    #[serde(rename = "delay_secs", with = "duration_secs")]
    pub delay: Duration,
}

impl AutoReplyPolicy {
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self { enabled, delay }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_blocked: bool,
    pub owner_id: i64,
    pub auto_reply: AutoReplyPolicy,
}

impl Post {
    /// The text that gets moderated for a post.
    pub fn moderation_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_blocked: bool,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
}

/// User-supplied fields for creating or replacing a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub auto_reply: bool,
    /// Seconds to wait before the automatic reply is posted.
    #[serde(default)]
    pub auto_reply_delay: u64,
}

impl PostDraft {
    pub fn policy(&self) -> AutoReplyPolicy {
        AutoReplyPolicy::new(self.auto_reply, Duration::from_secs(self.auto_reply_delay))
    }
}

/// User-supplied fields for creating or replacing a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub content: String,
}

/// A post ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub owner_id: i64,
    pub is_blocked: bool,
    pub auto_reply: AutoReplyPolicy,
}

/// A comment ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Apply to an ascending comparison.
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSortField {
    Title,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentSortField {
    CreatedAt,
    AuthorId,
}

pub const DEFAULT_PAGE_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostQuery {
    #[serde(flatten)]
    pub page: Page,
    #[serde(default)]
    pub sort_by: Option<PostSortField>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentQuery {
    #[serde(flatten)]
    pub page: Page,
    #[serde(default)]
    pub sort_by: Option<CommentSortField>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// What the store should return for a post listing.
#[derive(Debug, Clone, Copy)]
pub struct PostFilter {
    pub include_blocked: bool,
    pub query: PostQuery,
}

/// What the store should return for a comment listing.
#[derive(Debug, Clone, Copy)]
pub struct CommentFilter {
    pub post_id: i64,
    pub include_blocked: bool,
    pub query: CommentQuery,
}

/// Request for the per-day comment breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
    #[serde(default = "newest_first")]
    pub sort_order: SortOrder,
    #[serde(flatten)]
    pub page: Page,
}

fn newest_first() -> SortOrder {
    SortOrder::Desc
}

impl Default for AnalyticsQuery {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            sort_order: SortOrder::Desc,
            page: Page::default(),
        }
    }
}

/// Resolved date range handed to the store (both ends inclusive).
#[derive(Debug, Clone, Copy)]
pub struct DailyRange {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub sort_order: SortOrder,
    pub page: Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAnalytics {
    pub date: NaiveDate,
    pub total_comments: u64,
    pub blocked_comments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_draft_policy_uses_seconds() {
        let draft = PostDraft {
            title: "t".to_string(),
            content: "c".to_string(),
            auto_reply: true,
            auto_reply_delay: 90,
        };
        assert_eq!(
            draft.policy(),
            AutoReplyPolicy::new(true, Duration::from_secs(90))
        );
    }

    #[test]
    fn test_policy_serializes_delay_as_seconds() {
        let policy = AutoReplyPolicy::new(true, Duration::from_secs(2));
        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json, serde_json::json!({"enabled": true, "delay_secs": 2}));
    }

    #[test]
    fn test_query_defaults() {
        let query: AnalyticsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query, AnalyticsQuery::default());

        let query: CommentQuery = serde_json::from_str(r#"{"sort_by": "author_id"}"#).unwrap();
        assert_eq!(query.page, Page::default());
        assert_eq!(query.sort_by, Some(CommentSortField::AuthorId));
        assert_eq!(query.sort_order, SortOrder::Asc);
    }
}
