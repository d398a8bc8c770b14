// Delayed reply scheduler.
//
// `schedule` pushes a ReplyTask onto an in-memory queue and returns at once.
// A dispatcher drains the queue and runs every task in its own tokio task:
//
//   Created -> Generating -> Waiting -> Committing -> Done
//
// Tasks are best effort. Nothing is journaled, so a task still waiting when
// the process exits is lost, and a failed commit is logged and dropped.

use super::reply_generator::ReplyGenerator;
use crate::core::ai::AiProvider;
use crate::core::blog::{BlogStore, Comment, NewComment, Post};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Should a new comment on `post` get an automatic reply?
/// Blocked comments never do.
pub fn auto_reply_applies(post: &Post, comment: &Comment) -> bool {
    post.auto_reply.enabled && !comment.is_blocked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTaskState {
    Created,
    Generating,
    Waiting,
    Committing,
    Done,
}

impl std::fmt::Display for ReplyTaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyTaskState::Created => write!(f, "created"),
            ReplyTaskState::Generating => write!(f, "generating"),
            ReplyTaskState::Waiting => write!(f, "waiting"),
            ReplyTaskState::Committing => write!(f, "committing"),
            ReplyTaskState::Done => write!(f, "done"),
        }
    }
}

/// One pending automatic reply. Lives only in memory.
#[derive(Debug)]
pub struct ReplyTask {
    pub id: u64,
    pub post: Post,
    pub comment: Comment,
    pub delay: Duration,
    state: ReplyTaskState,
}

impl ReplyTask {
    fn new(id: u64, post: Post, comment: Comment, delay: Duration) -> Self {
        Self {
            id,
            post,
            comment,
            delay,
            state: ReplyTaskState::Created,
        }
    }

    pub fn state(&self) -> ReplyTaskState {
        self.state
    }

    fn advance(&mut self, next: ReplyTaskState) {
        tracing::debug!(
            task_id = self.id,
            post_id = self.post.id,
            comment_id = self.comment.id,
            "Reply task {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// The reply is posted by the post owner, threaded under the comment.
    fn reply_comment(&self, content: String) -> NewComment {
        NewComment {
            content,
            post_id: self.post.id,
            author_id: self.post.owner_id,
            parent_id: Some(self.comment.id),
            is_blocked: false,
        }
    }
}

/// Counts a task as in flight from `schedule` until it finishes, panics, or
/// is dropped unprocessed.
struct InFlightGuard {
    counter: Arc<watch::Sender<usize>>,
}

impl InFlightGuard {
    fn new(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self { counter }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.send_modify(|n| *n = n.saturating_sub(1));
    }
}

struct QueuedTask {
    task: ReplyTask,
    _guard: InFlightGuard,
}

pub struct ReplyScheduler {
    queue: mpsc::UnboundedSender<QueuedTask>,
    in_flight: Arc<watch::Sender<usize>>,
    next_id: AtomicU64,
}

impl ReplyScheduler {
    /// Start the dispatcher on the current tokio runtime.
    pub fn spawn<S, P>(store: Arc<S>, generator: Arc<ReplyGenerator<P>>) -> Self
    where
        S: BlogStore + 'static,
        P: AiProvider + 'static,
    {
        let (queue, rx) = mpsc::unbounded_channel();
        let (in_flight, _) = watch::channel(0usize);

        tokio::spawn(dispatch(rx, store, generator));

        Self {
            queue,
            in_flight: Arc::new(in_flight),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue an automatic reply to `comment`. Returns immediately.
    pub fn schedule(&self, post: Post, comment: Comment, delay: Duration) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = ReplyTask::new(id, post, comment, delay);

        tracing::info!(
            task_id = id,
            post_id = task.post.id,
            comment_id = task.comment.id,
            "Auto-reply scheduled in {:?}",
            delay
        );

        let queued = QueuedTask {
            task,
            _guard: InFlightGuard::new(Arc::clone(&self.in_flight)),
        };
        if self.queue.send(queued).is_err() {
            tracing::warn!(task_id = id, "Reply dispatcher is gone, auto-reply dropped");
        }
    }

    /// Number of replies scheduled but not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Resolves once no reply is pending.
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

async fn dispatch<S, P>(
    mut rx: mpsc::UnboundedReceiver<QueuedTask>,
    store: Arc<S>,
    generator: Arc<ReplyGenerator<P>>,
) where
    S: BlogStore + 'static,
    P: AiProvider + 'static,
{
    while let Some(queued) = rx.recv().await {
        let store = Arc::clone(&store);
        let generator = Arc::clone(&generator);
        tokio::spawn(async move {
            let QueuedTask { task, _guard } = queued;
            run_task(task, store.as_ref(), generator.as_ref()).await;
        });
    }
    tracing::debug!("Reply dispatcher stopped");
}

async fn run_task<S: BlogStore, P: AiProvider>(
    mut task: ReplyTask,
    store: &S,
    generator: &ReplyGenerator<P>,
) {
    task.advance(ReplyTaskState::Generating);
    let reply = generator
        .generate(&task.post.title, &task.post.content, &task.comment.content)
        .await;

    task.advance(ReplyTaskState::Waiting);
    tokio::time::sleep(task.delay).await;

    task.advance(ReplyTaskState::Committing);
    match store.create_comment(task.reply_comment(reply)).await {
        Ok(reply) => {
            task.advance(ReplyTaskState::Done);
            tracing::info!(
                task_id = task.id,
                post_id = task.post.id,
                comment_id = task.comment.id,
                reply_id = reply.id,
                "Auto-reply posted"
            );
        }
        Err(e) => {
            tracing::error!(
                task_id = task.id,
                post_id = task.post.id,
                comment_id = task.comment.id,
                state = %task.state(),
                "Auto-reply lost, could not save it: {}",
                e
            );
        }
    }
}
