//! Error types for scheduler operations.

use thiserror::Error;

use crate::util::serde::TaskId;

/// Errors produced by scheduler components.
///
/// Cloneable so a single settled outcome can be handed to every
/// [`TaskHandle`](crate::core::TaskHandle) waiting on the same task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Pending depth is at capacity. Never retried.
    #[error("queue full: max queue depth {0} reached")]
    QueueFull(usize),
    /// The executor did not settle within the task's timeout.
    #[error("task {task_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// Task that timed out.
        task_id: TaskId,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },
    /// The executor returned an error.
    #[error("task {task_id} failed: {message}")]
    Executor {
        /// Task whose executor failed.
        task_id: TaskId,
        /// Rendered error chain.
        message: String,
    },
    /// The task was explicitly cancelled. Always terminal.
    #[error("task {0} was cancelled")]
    Cancelled(TaskId),
    /// The task was rejected by a bulk `clear()`/`destroy()`. Always terminal.
    #[error("task {0} rejected: queue cleared")]
    QueueCleared(TaskId),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No async runtime was available to drive the scheduler.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl SchedulerError {
    /// Whether the retry policy may re-attempt after this error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Executor { .. })
    }

    /// Whether this error came from the timeout race.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Wrap an executor failure, keeping its context chain in the message.
    pub fn executor(task_id: impl Into<TaskId>, err: &anyhow::Error) -> Self {
        Self::Executor {
            task_id: task_id.into(),
            message: format!("{err:#}"),
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
///
/// Executors return this type; the scheduler flattens the error into
/// [`SchedulerError::Executor`].
pub type AppResult<T> = Result<T, anyhow::Error>;
