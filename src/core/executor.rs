//! Executor and spawner abstractions consumed by the scheduler.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::events::ProgressReporter;
use crate::core::AppResult;
use crate::util::serde::{Priority, TaskId};

/// Everything an executor gets to see about one attempt of a task.
#[derive(Clone)]
pub struct TaskContext {
    /// Task identifier.
    pub id: TaskId,
    /// Opaque target, e.g. the URL to fetch.
    pub target: String,
    /// Task priority.
    pub priority: Priority,
    /// Grouping label.
    pub category: Option<String>,
    /// Opaque payload from the task config.
    pub metadata: Option<serde_json::Value>,
    /// Retries used before this attempt.
    pub retry_count: u32,
    cancellation: CancellationToken,
    progress: ProgressReporter,
}

impl TaskContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) const fn new(
        id: TaskId,
        target: String,
        priority: Priority,
        category: Option<String>,
        metadata: Option<serde_json::Value>,
        retry_count: u32,
        cancellation: CancellationToken,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            id,
            target,
            priority,
            category,
            metadata,
            retry_count,
            cancellation,
            progress,
        }
    }

    /// Abort signal for this attempt. Fires on timeout or explicit
    /// cancellation; honoring it is up to the executor.
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether this attempt has been aborted.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Report progress. Observational only.
    pub fn report_progress(&self, loaded: u64, total: u64, stage: &str) {
        self.progress.update(loaded, total, stage);
    }
}

/// Performs the actual work of a task (fetch a model, decode an image, ...).
///
/// Supplied once when the scheduler is built. Any async closure
/// `Fn(TaskContext) -> impl Future<Output = AppResult<T>>` qualifies.
///
/// # Example
///
/// ```rust,ignore
/// use asset_task_scheduler::core::{AppResult, TaskContext, TaskExecutor};
///
/// struct HttpLoader { client: reqwest::Client }
///
/// #[async_trait::async_trait]
/// impl TaskExecutor<Vec<u8>> for HttpLoader {
///     async fn execute(&self, ctx: TaskContext) -> AppResult<Vec<u8>> {
///         let bytes = self.client.get(&ctx.target).send().await?.bytes().await?;
///         Ok(bytes.to_vec())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor<T>: Send + Sync + 'static {
    /// Run one attempt of the task described by `ctx`.
    async fn execute(&self, ctx: TaskContext) -> AppResult<T>;
}

#[async_trait]
impl<T, F, Fut> TaskExecutor<T> for F
where
    T: Send + 'static,
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    async fn execute(&self, ctx: TaskContext) -> AppResult<T> {
        (self)(ctx).await
    }
}

/// Abstraction for spawning detached futures on a runtime.
pub trait Spawn {
    /// Spawn a future; its completion is not awaited.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
