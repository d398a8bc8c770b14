// Console commands - one JSON request in, one JSON response out.
//
// **Notice the pattern:**
// 1. Parse the request line into a typed command
// 2. Call the blog service as the given actor
// 3. Turn the result into an `ok` or `error` object
//
// No business rules live here.

use crate::core::ai::AiProvider;
use crate::core::blog::{
    Actor, AnalyticsQuery, BlogError, BlogService, BlogStore, CommentDraft, CommentQuery,
    PostDraft, PostQuery,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A request line: who is asking, plus the command fields.
///
/// `{"actor": {"user_id": 2}, "command": "create_comment", "post_id": 1, "content": "Nice!"}`
#[derive(Debug, Deserialize)]
pub struct Request {
    pub actor: Actor,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    CreatePost {
        #[serde(flatten)]
        draft: PostDraft,
    },
    UpdatePost {
        post_id: i64,
        #[serde(flatten)]
        draft: PostDraft,
    },
    DeletePost {
        post_id: i64,
    },
    GetPost {
        post_id: i64,
    },
    ListPosts {
        #[serde(flatten)]
        query: PostQuery,
    },
    CreateComment {
        post_id: i64,
        #[serde(default)]
        parent_id: Option<i64>,
        content: String,
    },
    UpdateComment {
        comment_id: i64,
        content: String,
    },
    DeleteComment {
        comment_id: i64,
    },
    GetComment {
        comment_id: i64,
    },
    ListComments {
        post_id: i64,
        #[serde(flatten)]
        query: CommentQuery,
    },
    CommentAnalytics {
        #[serde(flatten)]
        query: AnalyticsQuery,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreatePost { .. } => "create_post",
            Command::UpdatePost { .. } => "update_post",
            Command::DeletePost { .. } => "delete_post",
            Command::GetPost { .. } => "get_post",
            Command::ListPosts { .. } => "list_posts",
            Command::CreateComment { .. } => "create_comment",
            Command::UpdateComment { .. } => "update_comment",
            Command::DeleteComment { .. } => "delete_comment",
            Command::GetComment { .. } => "get_comment",
            Command::ListComments { .. } => "list_comments",
            Command::CommentAnalytics { .. } => "comment_analytics",
        }
    }
}

/// What gets written back, one per request line.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Ok { ok: Value },
    Error { error: String, kind: &'static str },
}

impl Response {
    fn ok<T: Serialize>(value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(ok) => Response::Ok { ok },
            Err(e) => Response::Error {
                error: e.to_string(),
                kind: "internal",
            },
        }
    }

    pub fn bad_request(message: impl ToString) -> Self {
        Response::Error {
            error: message.to_string(),
            kind: "bad_request",
        }
    }
}

impl From<BlogError> for Response {
    fn from(e: BlogError) -> Self {
        Response::Error {
            error: e.to_string(),
            kind: e.kind(),
        }
    }
}

fn respond<T: Serialize>(result: Result<T, BlogError>) -> Response {
    match result {
        Ok(value) => Response::ok(value),
        Err(e) => e.into(),
    }
}

/// Run one command against the service.
pub async fn execute<S: BlogStore, P: AiProvider>(
    service: &BlogService<S, P>,
    actor: &Actor,
    command: Command,
) -> Response {
    match command {
        Command::CreatePost { draft } => respond(service.create_post(actor, draft).await),
        Command::UpdatePost { post_id, draft } => {
            respond(service.update_post(actor, post_id, draft).await)
        }
        Command::DeletePost { post_id } => respond(
            service
                .delete_post(actor, post_id)
                .await
                .map(|_| json!({ "deleted": post_id })),
        ),
        Command::GetPost { post_id } => respond(service.get_post(actor, post_id).await),
        Command::ListPosts { query } => respond(service.list_posts(actor, query).await),
        Command::CreateComment {
            post_id,
            parent_id,
            content,
        } => respond(
            service
                .create_comment(actor, post_id, parent_id, CommentDraft { content })
                .await,
        ),
        Command::UpdateComment {
            comment_id,
            content,
        } => respond(
            service
                .update_comment(actor, comment_id, CommentDraft { content })
                .await,
        ),
        Command::DeleteComment { comment_id } => respond(
            service
                .delete_comment(actor, comment_id)
                .await
                .map(|_| json!({ "deleted": comment_id })),
        ),
        Command::GetComment { comment_id } => respond(service.get_comment(actor, comment_id).await),
        Command::ListComments { post_id, query } => {
            respond(service.list_comments(actor, post_id, query).await)
        }
        Command::CommentAnalytics { query } => {
            respond(service.comment_analytics(actor, query).await)
        }
    }
}

/// Parse and run a single request line.
pub async fn handle_line<S: BlogStore, P: AiProvider>(
    service: &BlogService<S, P>,
    line: &str,
) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("Rejected request line: {}", e);
            return Response::bad_request(e);
        }
    };

    tracing::debug!(
        user_id = request.actor.user_id,
        command = request.command.name(),
        "Handling request"
    );
    execute(service, &request.actor, request.command).await
}
