// In-memory implementation of BlogStore.
//
// Used by the service and scheduler tests, and selected at runtime with
// `DATABASE_URL=memory` when no database is wanted. Nothing survives a restart.

use crate::core::blog::{
    BlogError, BlogStore, Comment, CommentAnalytics, CommentFilter, CommentSortField, DailyRange,
    NewComment, NewPost, Page, Post, PostFilter, PostSortField,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Posts and comments keyed by id.
///
/// **DashMap:** concurrent access from request handling and reply tasks
/// without an outer Mutex.
pub struct InMemoryBlogStore {
    posts: DashMap<i64, Post>,
    comments: DashMap<i64, Comment>,
    next_post_id: AtomicI64,
    next_comment_id: AtomicI64,
}

impl InMemoryBlogStore {
    pub fn new() -> Self {
        Self {
            posts: DashMap::new(),
            comments: DashMap::new(),
            next_post_id: AtomicI64::new(1),
            next_comment_id: AtomicI64::new(1),
        }
    }

    /// Ids of the comment and every reply below it.
    fn thread_ids(&self, root_id: i64) -> Vec<i64> {
        let mut ids = vec![root_id];
        let mut cursor = 0;
        while cursor < ids.len() {
            let parent = ids[cursor];
            ids.extend(
                self.comments
                    .iter()
                    .filter(|c| c.parent_id == Some(parent))
                    .map(|c| c.id),
            );
            cursor += 1;
        }
        ids
    }
}

impl Default for InMemoryBlogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl BlogStore for InMemoryBlogStore {
    async fn create_post(&self, post: NewPost) -> Result<Post, BlogError> {
        let id = self.next_post_id.fetch_add(1, Ordering::SeqCst);
        let stored = Post {
            id,
            title: post.title,
            content: post.content,
            created_at: Utc::now(),
            is_blocked: post.is_blocked,
            owner_id: post.owner_id,
            auto_reply: post.auto_reply,
        };
        self.posts.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, BlogError> {
        Ok(self.posts.get(&post_id).map(|p| p.clone()))
    }

    async fn update_post(&self, post: &Post) -> Result<Post, BlogError> {
        // Only the editable columns change; id, owner and created_at stay.
        let mut entry = self
            .posts
            .get_mut(&post.id)
            .ok_or(BlogError::NotFound("Post"))?;
        entry.title = post.title.clone();
        entry.content = post.content.clone();
        entry.is_blocked = post.is_blocked;
        entry.auto_reply = post.auto_reply;
        Ok(entry.clone())
    }

    async fn delete_post(&self, post_id: i64) -> Result<(), BlogError> {
        self.posts.remove(&post_id);
        self.comments.retain(|_, c| c.post_id != post_id);
        Ok(())
    }

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, BlogError> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| filter.include_blocked || !p.is_blocked)
            .map(|p| p.clone())
            .collect();

        let order = filter.query.sort_order;
        match filter.query.sort_by {
            Some(PostSortField::Title) => {
                posts.sort_by(|a, b| order.apply(a.title.cmp(&b.title).then(a.id.cmp(&b.id))))
            }
            Some(PostSortField::Date) => posts.sort_by(|a, b| {
                order.apply(a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            }),
            None => posts.sort_by_key(|p| p.id),
        }

        Ok(paginate(posts, filter.query.page))
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, BlogError> {
        if !self.posts.contains_key(&comment.post_id) {
            return Err(BlogError::NotFound("Post"));
        }

        let id = self.next_comment_id.fetch_add(1, Ordering::SeqCst);
        let stored = Comment {
            id,
            content: comment.content,
            created_at: Utc::now(),
            is_blocked: comment.is_blocked,
            post_id: comment.post_id,
            author_id: comment.author_id,
            parent_id: comment.parent_id,
        };
        self.comments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>, BlogError> {
        Ok(self.comments.get(&comment_id).map(|c| c.clone()))
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment, BlogError> {
        let mut entry = self
            .comments
            .get_mut(&comment.id)
            .ok_or(BlogError::NotFound("Comment"))?;
        entry.content = comment.content.clone();
        entry.is_blocked = comment.is_blocked;
        Ok(entry.clone())
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), BlogError> {
        for id in self.thread_ids(comment_id) {
            self.comments.remove(&id);
        }
        Ok(())
    }

    async fn list_comments(&self, filter: CommentFilter) -> Result<Vec<Comment>, BlogError> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == filter.post_id)
            .filter(|c| filter.include_blocked || !c.is_blocked)
            .map(|c| c.clone())
            .collect();

        let order = filter.query.sort_order;
        match filter.query.sort_by {
            Some(CommentSortField::CreatedAt) => comments.sort_by(|a, b| {
                order.apply(a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            }),
            Some(CommentSortField::AuthorId) => comments.sort_by(|a, b| {
                order.apply(a.author_id.cmp(&b.author_id).then(a.id.cmp(&b.id)))
            }),
            None => comments.sort_by_key(|c| c.id),
        }

        Ok(paginate(comments, filter.query.page))
    }

    async fn first_comment_date(&self) -> Result<Option<NaiveDate>, BlogError> {
        Ok(self
            .comments
            .iter()
            .map(|c| c.created_at.date_naive())
            .min())
    }

    async fn comment_daily_breakdown(
        &self,
        range: DailyRange,
    ) -> Result<Vec<CommentAnalytics>, BlogError> {
        // date -> (total, blocked)
        let mut days: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
        for comment in self.comments.iter() {
            let date = comment.created_at.date_naive();
            if date < range.date_from || date > range.date_to {
                continue;
            }
            let counts = days.entry(date).or_default();
            counts.0 += 1;
            if comment.is_blocked {
                counts.1 += 1;
            }
        }

        let mut stats: Vec<CommentAnalytics> = days
            .into_iter()
            .map(|(date, (total, blocked))| CommentAnalytics {
                date,
                total_comments: total,
                blocked_comments: blocked,
            })
            .collect();
        stats.sort_by(|a, b| range.sort_order.apply(a.date.cmp(&b.date)));

        Ok(paginate(stats, range.page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blog::{AutoReplyPolicy, CommentQuery, PostQuery, SortOrder};
    use chrono::{TimeZone, Utc};

    fn new_post(title: &str, is_blocked: bool) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: "content".to_string(),
            owner_id: 1,
            is_blocked,
            auto_reply: AutoReplyPolicy::default(),
        }
    }

    fn new_comment(post_id: i64, author_id: i64, parent_id: Option<i64>, is_blocked: bool) -> NewComment {
        NewComment {
            content: "hello".to_string(),
            post_id,
            author_id,
            parent_id,
            is_blocked,
        }
    }

    fn backdate(store: &InMemoryBlogStore, comment_id: i64, y: i32, m: u32, d: u32) {
        let mut comment = store.comments.get_mut(&comment_id).unwrap();
        comment.created_at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
    }

    #[tokio::test]
    async fn test_ids_are_sequential_and_rows_read_back() {
        let store = InMemoryBlogStore::new();
        let a = store.create_post(new_post("a", false)).await.unwrap();
        let b = store.create_post(new_post("b", false)).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(store.get_post(a.id).await.unwrap(), Some(a));
        assert_eq!(store.get_post(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_posts_filters_sorts_and_pages() {
        let store = InMemoryBlogStore::new();
        store.create_post(new_post("banana", false)).await.unwrap();
        store.create_post(new_post("apple", false)).await.unwrap();
        store.create_post(new_post("hidden", true)).await.unwrap();
        store.create_post(new_post("cherry", false)).await.unwrap();

        let query = PostQuery {
            sort_by: Some(PostSortField::Title),
            sort_order: SortOrder::Desc,
            page: Page { offset: 1, limit: 2 },
        };
        let visible = store
            .list_posts(PostFilter {
                include_blocked: false,
                query,
            })
            .await
            .unwrap();
        let titles: Vec<&str> = visible.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["banana", "apple"]);

        let all = store
            .list_posts(PostFilter {
                include_blocked: true,
                query: PostQuery::default(),
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_delete_post_removes_its_comments() {
        let store = InMemoryBlogStore::new();
        let keep = store.create_post(new_post("keep", false)).await.unwrap();
        let gone = store.create_post(new_post("gone", false)).await.unwrap();
        let kept_comment = store.create_comment(new_comment(keep.id, 2, None, false)).await.unwrap();
        let gone_comment = store.create_comment(new_comment(gone.id, 2, None, false)).await.unwrap();

        store.delete_post(gone.id).await.unwrap();

        assert!(store.get_post(gone.id).await.unwrap().is_none());
        assert!(store.get_comment(gone_comment.id).await.unwrap().is_none());
        assert!(store.get_comment(kept_comment.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_comment_removes_replies_below_it() {
        let store = InMemoryBlogStore::new();
        let post = store.create_post(new_post("p", false)).await.unwrap();
        let root = store.create_comment(new_comment(post.id, 2, None, false)).await.unwrap();
        let reply = store
            .create_comment(new_comment(post.id, 1, Some(root.id), false))
            .await
            .unwrap();
        let nested = store
            .create_comment(new_comment(post.id, 2, Some(reply.id), false))
            .await
            .unwrap();
        let sibling = store.create_comment(new_comment(post.id, 3, None, false)).await.unwrap();

        store.delete_comment(root.id).await.unwrap();

        for id in [root.id, reply.id, nested.id] {
            assert!(store.get_comment(id).await.unwrap().is_none());
        }
        assert!(store.get_comment(sibling.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_comment_needs_existing_post() {
        let store = InMemoryBlogStore::new();
        assert!(matches!(
            store.create_comment(new_comment(7, 2, None, false)).await,
            Err(BlogError::NotFound("Post"))
        ));
    }

    #[tokio::test]
    async fn test_list_comments_by_author() {
        let store = InMemoryBlogStore::new();
        let post = store.create_post(new_post("p", false)).await.unwrap();
        store.create_comment(new_comment(post.id, 5, None, false)).await.unwrap();
        store.create_comment(new_comment(post.id, 3, None, false)).await.unwrap();
        store.create_comment(new_comment(post.id, 4, None, true)).await.unwrap();

        let comments = store
            .list_comments(CommentFilter {
                post_id: post.id,
                include_blocked: false,
                query: CommentQuery {
                    sort_by: Some(CommentSortField::AuthorId),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        let authors: Vec<i64> = comments.iter().map(|c| c.author_id).collect();
        assert_eq!(authors, vec![3, 5]);
    }

    #[tokio::test]
    async fn test_daily_breakdown() {
        let store = InMemoryBlogStore::new();
        let post = store.create_post(new_post("p", false)).await.unwrap();
        let mut ids = Vec::new();
        for blocked in [false, true, false, false] {
            ids.push(
                store
                    .create_comment(new_comment(post.id, 2, None, blocked))
                    .await
                    .unwrap()
                    .id,
            );
        }
        backdate(&store, ids[0], 2024, 5, 1);
        backdate(&store, ids[1], 2024, 5, 1);
        backdate(&store, ids[2], 2024, 5, 3);
        backdate(&store, ids[3], 2024, 6, 1);

        assert_eq!(
            store.first_comment_date().await.unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );

        let stats = store
            .comment_daily_breakdown(DailyRange {
                date_from: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                date_to: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
                sort_order: SortOrder::Desc,
                page: Page::default(),
            })
            .await
            .unwrap();

        assert_eq!(
            stats,
            vec![
                CommentAnalytics {
                    date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
                    total_comments: 1,
                    blocked_comments: 0,
                },
                CommentAnalytics {
                    date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                    total_comments: 2,
                    blocked_comments: 1,
                },
            ]
        );
    }
}
