// Blog service - posts and comments with moderation, visibility and
// automatic replies.
//
// Every create/update runs the content moderator before anything is stored,
// so `is_blocked` is always set from the text actually saved. Non-superusers
// never see blocked content.

use super::blog_models::*;
use crate::core::ai::AiProvider;
use crate::core::auto_reply::{auto_reply_applies, ReplyScheduler};
use crate::core::moderation::ContentModerator;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} is blocked")]
    Blocked(&'static str),

    #[error("Not authorized to {0}")]
    Forbidden(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl BlogError {
    /// Short machine-readable name, used by the console surface.
    pub fn kind(&self) -> &'static str {
        match self {
            BlogError::NotFound(_) => "not_found",
            BlogError::Blocked(_) => "blocked",
            BlogError::Forbidden(_) => "forbidden",
            BlogError::InvalidInput(_) => "invalid_input",
            BlogError::StorageError(_) => "storage",
        }
    }
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for posts and comments.
///
/// Every write is a single unit: `create_*` and `update_*` return the row as
/// read back after the commit.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<Post, BlogError>;

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, BlogError>;

    async fn update_post(&self, post: &Post) -> Result<Post, BlogError>;

    /// Deletes the post and its comments.
    async fn delete_post(&self, post_id: i64) -> Result<(), BlogError>;

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, BlogError>;

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, BlogError>;

    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>, BlogError>;

    async fn update_comment(&self, comment: &Comment) -> Result<Comment, BlogError>;

    async fn delete_comment(&self, comment_id: i64) -> Result<(), BlogError>;

    async fn list_comments(&self, filter: CommentFilter) -> Result<Vec<Comment>, BlogError>;

    /// Date of the oldest comment, if there is one.
    async fn first_comment_date(&self) -> Result<Option<NaiveDate>, BlogError>;

    /// Per-day comment totals within the range. Days without comments are
    /// omitted.
    async fn comment_daily_breakdown(
        &self,
        range: DailyRange,
    ) -> Result<Vec<CommentAnalytics>, BlogError>;
}

/// Reply policy of a draft. Stores keep the delay as a signed 64-bit
/// number of seconds, so anything larger is refused.
fn checked_policy(draft: &PostDraft) -> Result<AutoReplyPolicy, BlogError> {
    if i64::try_from(draft.auto_reply_delay).is_err() {
        return Err(BlogError::InvalidInput(format!(
            "auto_reply_delay must be at most {} seconds",
            i64::MAX
        )));
    }
    Ok(draft.policy())
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct BlogService<S: BlogStore, P: AiProvider> {
    store: Arc<S>,
    moderator: ContentModerator<P>,
    replies: ReplyScheduler,
}

impl<S: BlogStore, P: AiProvider> BlogService<S, P> {
    pub fn new(store: Arc<S>, moderator: ContentModerator<P>, replies: ReplyScheduler) -> Self {
        Self {
            store,
            moderator,
            replies,
        }
    }

    /// The automatic reply queue, e.g. to wait for pending replies.
    pub fn replies(&self) -> &ReplyScheduler {
        &self.replies
    }

    async fn is_blocked(&self, text: &str) -> bool {
        let verdict = self.moderator.evaluate(text).await;
        if !verdict.is_accepted() {
            tracing::info!("Content blocked by moderation: {}", verdict);
        }
        !verdict.is_accepted()
    }

    async fn find_post(&self, post_id: i64) -> Result<Post, BlogError> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or(BlogError::NotFound("Post"))
    }

    async fn find_comment(&self, comment_id: i64) -> Result<Comment, BlogError> {
        self.store
            .get_comment(comment_id)
            .await?
            .ok_or(BlogError::NotFound("Comment"))
    }

    // ------------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------------

    pub async fn create_post(&self, actor: &Actor, draft: PostDraft) -> Result<Post, BlogError> {
        let auto_reply = checked_policy(&draft)?;
        let is_blocked = self
            .is_blocked(&format!("{} {}", draft.title, draft.content))
            .await;

        let post = self
            .store
            .create_post(NewPost {
                auto_reply,
                title: draft.title,
                content: draft.content,
                owner_id: actor.user_id,
                is_blocked,
            })
            .await?;

        tracing::info!(post_id = post.id, owner_id = post.owner_id, is_blocked, "Post created");
        Ok(post)
    }

    pub async fn update_post(
        &self,
        actor: &Actor,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<Post, BlogError> {
        let mut post = self.find_post(post_id).await?;
        if post.owner_id != actor.user_id {
            return Err(BlogError::Forbidden("update this post"));
        }

        post.auto_reply = checked_policy(&draft)?;
        post.title = draft.title;
        post.content = draft.content;
        post.is_blocked = self.is_blocked(&post.moderation_text()).await;

        self.store.update_post(&post).await
    }

    pub async fn delete_post(&self, actor: &Actor, post_id: i64) -> Result<(), BlogError> {
        let post = self.find_post(post_id).await?;
        if post.owner_id != actor.user_id {
            return Err(BlogError::Forbidden("delete this post"));
        }
        self.store.delete_post(post_id).await
    }

    pub async fn get_post(&self, actor: &Actor, post_id: i64) -> Result<Post, BlogError> {
        let post = self.find_post(post_id).await?;
        if post.is_blocked && !actor.is_superuser {
            return Err(BlogError::Blocked("Post"));
        }
        Ok(post)
    }

    pub async fn list_posts(&self, actor: &Actor, query: PostQuery) -> Result<Vec<Post>, BlogError> {
        self.store
            .list_posts(PostFilter {
                include_blocked: actor.is_superuser,
                query,
            })
            .await
    }

    // ------------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------------

    /// Create a comment, then queue an automatic reply if the post wants one
    /// and the comment was not blocked.
    pub async fn create_comment(
        &self,
        actor: &Actor,
        post_id: i64,
        parent_id: Option<i64>,
        draft: CommentDraft,
    ) -> Result<Comment, BlogError> {
        let post = self.find_post(post_id).await?;

        if let Some(parent_id) = parent_id {
            let parent = self
                .store
                .get_comment(parent_id)
                .await?
                .ok_or(BlogError::NotFound("Parent comment"))?;
            if parent.post_id != post.id {
                return Err(BlogError::InvalidInput(format!(
                    "comment {} does not belong to post {}",
                    parent_id, post.id
                )));
            }
        }

        if post.is_blocked {
            return Err(BlogError::Blocked("Post"));
        }

        let is_blocked = self.is_blocked(&draft.content).await;
        let comment = self
            .store
            .create_comment(NewComment {
                content: draft.content,
                post_id: post.id,
                author_id: actor.user_id,
                parent_id,
                is_blocked,
            })
            .await?;

        tracing::info!(
            comment_id = comment.id,
            post_id = post.id,
            is_blocked,
            "Comment created"
        );

        if auto_reply_applies(&post, &comment) {
            let delay = post.auto_reply.delay;
            self.replies.schedule(post, comment.clone(), delay);
        }

        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        actor: &Actor,
        comment_id: i64,
        draft: CommentDraft,
    ) -> Result<Comment, BlogError> {
        let mut comment = self.find_comment(comment_id).await?;
        if comment.author_id != actor.user_id {
            return Err(BlogError::Forbidden("update this comment"));
        }

        comment.is_blocked = self.is_blocked(&draft.content).await;
        comment.content = draft.content;

        self.store.update_comment(&comment).await
    }

    pub async fn delete_comment(&self, actor: &Actor, comment_id: i64) -> Result<(), BlogError> {
        let comment = self.find_comment(comment_id).await?;
        if comment.author_id != actor.user_id {
            return Err(BlogError::Forbidden("delete this comment"));
        }
        self.store.delete_comment(comment_id).await
    }

    pub async fn get_comment(&self, actor: &Actor, comment_id: i64) -> Result<Comment, BlogError> {
        let comment = self.find_comment(comment_id).await?;
        if comment.is_blocked && !actor.is_superuser {
            return Err(BlogError::Blocked("Comment"));
        }
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        actor: &Actor,
        post_id: i64,
        query: CommentQuery,
    ) -> Result<Vec<Comment>, BlogError> {
        let post = self.find_post(post_id).await?;
        if post.is_blocked && !actor.is_superuser {
            return Err(BlogError::Blocked("Post"));
        }

        self.store
            .list_comments(CommentFilter {
                post_id,
                include_blocked: actor.is_superuser,
                query,
            })
            .await
    }

    // ------------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------------

    /// Daily totals of created and blocked comments. Superusers only.
    pub async fn comment_analytics(
        &self,
        actor: &Actor,
        query: AnalyticsQuery,
    ) -> Result<Vec<CommentAnalytics>, BlogError> {
        if !actor.is_superuser {
            return Err(BlogError::Forbidden("view analytics"));
        }

        let date_from = match query.date_from {
            Some(date) => date,
            None => match self.store.first_comment_date().await? {
                Some(date) => date,
                None => return Ok(Vec::new()),
            },
        };
        let date_to = query.date_to.unwrap_or_else(|| Utc::now().date_naive());

        if date_from > date_to {
            return Err(BlogError::InvalidInput(format!(
                "date_from {} is after date_to {}",
                date_from, date_to
            )));
        }

        self.store
            .comment_daily_breakdown(DailyRange {
                date_from,
                date_to,
                sort_order: query.sort_order,
                page: query.page,
            })
            .await
    }
}

// ============================================================================
// TESTS
// ============================================================================
