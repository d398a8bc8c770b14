// SQLite implementation of the BlogStore trait

use crate::core::blog::{
    AutoReplyPolicy, BlogError, BlogStore, Comment, CommentAnalytics, CommentFilter,
    CommentSortField, DailyRange, NewComment, NewPost, Post, PostFilter, PostSortField,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;

const POST_COLUMNS: &str =
    "id, title, content, created_at, is_blocked, owner_id, auto_reply, auto_reply_delay";
const COMMENT_COLUMNS: &str = "id, content, created_at, is_blocked, post_id, author_id, parent_id";

pub struct SqliteBlogStore {
    pool: SqlitePool,
}

impl SqliteBlogStore {
    /// Open (creating if needed) the database and run migrations.
    ///
    /// Accepts a bare file path, a `sqlite://` URL or `sqlite::memory:`.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !in_memory && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create tables.
    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                is_blocked BOOLEAN NOT NULL DEFAULT 0,
                owner_id INTEGER NOT NULL,
                auto_reply BOOLEAN NOT NULL DEFAULT 0,
                auto_reply_delay INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                is_blocked BOOLEAN NOT NULL DEFAULT 0,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL,
                parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Listing by post and the daily breakdown both filter on these
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_created ON comments(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn storage_error(e: sqlx::Error) -> BlogError {
    BlogError::StorageError(e.to_string())
}

/// Timestamps are stored as RFC 3339 text in UTC, so the first ten
/// characters are the calendar date.
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, BlogError> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| BlogError::StorageError(format!("bad timestamp {:?}: {}", text, e)))
}

fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The delay column is a signed integer; refuse what would wrap.
fn encode_delay(policy: &AutoReplyPolicy) -> Result<i64, BlogError> {
    i64::try_from(policy.delay.as_secs()).map_err(|_| {
        BlogError::InvalidInput(format!(
            "auto_reply_delay of {} seconds is out of range",
            policy.delay.as_secs()
        ))
    })
}

fn row_to_post(row: &SqliteRow) -> Result<Post, BlogError> {
    let created_at: String = row.get("created_at");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        created_at: decode_timestamp(&created_at)?,
        is_blocked: row.get("is_blocked"),
        owner_id: row.get("owner_id"),
        auto_reply: AutoReplyPolicy::new(
            row.get("auto_reply"),
            Duration::from_secs(row.get::<i64, _>("auto_reply_delay").max(0) as u64),
        ),
    })
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment, BlogError> {
    let created_at: String = row.get("created_at");
    Ok(Comment {
        id: row.get("id"),
        content: row.get("content"),
        created_at: decode_timestamp(&created_at)?,
        is_blocked: row.get("is_blocked"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        parent_id: row.get("parent_id"),
    })
}

#[async_trait]
impl BlogStore for SqliteBlogStore {
    async fn create_post(&self, post: NewPost) -> Result<Post, BlogError> {
        let delay = encode_delay(&post.auto_reply)?;
        let result = sqlx::query(
            r#"
            INSERT INTO posts (title, content, created_at, is_blocked, owner_id, auto_reply, auto_reply_delay)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(encode_timestamp(Utc::now()))
        .bind(post.is_blocked)
        .bind(post.owner_id)
        .bind(post.auto_reply.enabled)
        .bind(delay)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        self.get_post(result.last_insert_rowid())
            .await?
            .ok_or_else(|| BlogError::StorageError("inserted post vanished".to_string()))
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>, BlogError> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn update_post(&self, post: &Post) -> Result<Post, BlogError> {
        let delay = encode_delay(&post.auto_reply)?;
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = ?, content = ?, is_blocked = ?, auto_reply = ?, auto_reply_delay = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.is_blocked)
        .bind(post.auto_reply.enabled)
        .bind(delay)
        .bind(post.id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(BlogError::NotFound("Post"));
        }

        self.get_post(post.id)
            .await?
            .ok_or(BlogError::NotFound("Post"))
    }

    async fn delete_post(&self, post_id: i64) -> Result<(), BlogError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, BlogError> {
        let order = filter.query.sort_order.as_sql();
        let order_by = match filter.query.sort_by {
            Some(PostSortField::Title) => format!("title {0}, id {0}", order),
            Some(PostSortField::Date) => format!("created_at {0}, id {0}", order),
            None => "id ASC".to_string(),
        };

        let sql = format!(
            "SELECT {} FROM posts WHERE (? OR is_blocked = 0) ORDER BY {} LIMIT ? OFFSET ?",
            POST_COLUMNS, order_by
        );
        let rows = sqlx::query(&sql)
            .bind(filter.include_blocked)
            .bind(filter.query.page.limit as i64)
            .bind(filter.query.page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.iter().map(row_to_post).collect()
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, BlogError> {
        // The post may have been deleted while a reply was waiting.
        let result = sqlx::query(
            r#"
            INSERT INTO comments (content, created_at, is_blocked, post_id, author_id, parent_id)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM posts WHERE id = ?)
            "#,
        )
        .bind(&comment.content)
        .bind(encode_timestamp(Utc::now()))
        .bind(comment.is_blocked)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.parent_id)
        .bind(comment.post_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(BlogError::NotFound("Post"));
        }

        self.get_comment(result.last_insert_rowid())
            .await?
            .ok_or_else(|| BlogError::StorageError("inserted comment vanished".to_string()))
    }

    async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>, BlogError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments WHERE id = ?",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(row_to_comment).transpose()
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment, BlogError> {
        let result = sqlx::query("UPDATE comments SET content = ?, is_blocked = ? WHERE id = ?")
            .bind(&comment.content)
            .bind(comment.is_blocked)
            .bind(comment.id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(BlogError::NotFound("Comment"));
        }

        self.get_comment(comment.id)
            .await?
            .ok_or(BlogError::NotFound("Comment"))
    }

    async fn delete_comment(&self, comment_id: i64) -> Result<(), BlogError> {
        // Replies go with the comment they answer.
        sqlx::query(
            r#"
            WITH RECURSIVE thread(id) AS (
                SELECT ?
                UNION ALL
                SELECT c.id FROM comments c JOIN thread t ON c.parent_id = t.id
            )
            DELETE FROM comments WHERE id IN (SELECT id FROM thread)
            "#,
        )
        .bind(comment_id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn list_comments(&self, filter: CommentFilter) -> Result<Vec<Comment>, BlogError> {
        let order = filter.query.sort_order.as_sql();
        let order_by = match filter.query.sort_by {
            Some(CommentSortField::CreatedAt) => format!("created_at {0}, id {0}", order),
            Some(CommentSortField::AuthorId) => format!("author_id {0}, id {0}", order),
            None => "id ASC".to_string(),
        };

        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = ? AND (? OR is_blocked = 0) ORDER BY {} LIMIT ? OFFSET ?",
            COMMENT_COLUMNS, order_by
        );
        let rows = sqlx::query(&sql)
            .bind(filter.post_id)
            .bind(filter.include_blocked)
            .bind(filter.query.page.limit as i64)
            .bind(filter.query.page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.iter().map(row_to_comment).collect()
    }

    async fn first_comment_date(&self) -> Result<Option<NaiveDate>, BlogError> {
        let first: Option<String> = sqlx::query("SELECT MIN(created_at) FROM comments")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?
            .get(0);

        first
            .map(|text| decode_timestamp(&text).map(|at| at.date_naive()))
            .transpose()
    }

    async fn comment_daily_breakdown(
        &self,
        range: DailyRange,
    ) -> Result<Vec<CommentAnalytics>, BlogError> {
        let sql = format!(
            r#"
            SELECT substr(created_at, 1, 10) AS day,
                   COUNT(*) AS total,
                   SUM(CASE WHEN is_blocked THEN 1 ELSE 0 END) AS blocked
            FROM comments
            WHERE substr(created_at, 1, 10) BETWEEN ? AND ?
            GROUP BY day
            ORDER BY day {}
            LIMIT ? OFFSET ?
            "#,
            range.sort_order.as_sql()
        );

        let rows = sqlx::query(&sql)
            .bind(encode_date(range.date_from))
            .bind(encode_date(range.date_to))
            .bind(range.page.limit as i64)
            .bind(range.page.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.iter()
            .map(|row| {
                let day: String = row.get("day");
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .map_err(|e| BlogError::StorageError(format!("bad date {:?}: {}", day, e)))?;
                Ok(CommentAnalytics {
                    date,
                    total_comments: row.get::<i64, _>("total") as u64,
                    blocked_comments: row.get::<i64, _>("blocked") as u64,
                })
            })
            .collect()
    }
}
