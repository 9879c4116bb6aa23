//! Task model: caller configuration, resolved configuration, live task state
//! and the per-task completion slot.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::core::events::ProgressUpdate;
use crate::core::SchedulerError;
use crate::util::clock::now_ms;
use crate::util::serde::{Priority, TaskId};

/// Invoked after a successful attempt with the attempt's execution time.
pub type CompletionCallback = Arc<dyn Fn(&TaskId, Duration) + Send + Sync>;
/// Invoked after every failed attempt, retried or not.
pub type ErrorCallback = Arc<dyn Fn(&TaskId, &SchedulerError) + Send + Sync>;
/// Invoked on every progress report.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Status of a task in the scheduler lifecycle.
///
/// `Pending -> Queued -> Running -> {Completed, Failed, Cancelled, Timeout}`.
/// `Failed`/`Timeout` loop back to `Pending` while retry budget remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created or waiting for a retry slot in the pending list.
    Pending,
    /// Selected by dequeue, about to run.
    Queued,
    /// Executor in flight.
    Running,
    /// Finished successfully.
    Completed,
    /// Executor failed.
    Failed,
    /// Explicitly cancelled or cleared.
    Cancelled,
    /// Executor did not settle within the timeout.
    Timeout,
}

impl TaskStatus {
    /// `Completed` and `Cancelled` never transition again.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses the retry policy may move back to `Pending`.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Failed | Self::Timeout)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// Optional per-task hooks.
#[derive(Clone, Default)]
pub struct TaskCallbacks {
    /// See [`CompletionCallback`].
    pub on_complete: Option<CompletionCallback>,
    /// See [`ErrorCallback`].
    pub on_error: Option<ErrorCallback>,
    /// See [`ProgressCallback`].
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for TaskCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCallbacks")
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Caller-supplied task description. Unset fields take queue defaults when
/// the task is enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique identifier among live tasks.
    pub id: TaskId,
    /// Opaque target handed to the executor, typically a URL.
    pub target: String,
    /// Scheduling priority.
    #[serde(default)]
    pub priority: Priority,
    /// Per-attempt timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Retry budget (attempts after the first).
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Opaque grouping label.
    #[serde(default)]
    pub category: Option<String>,
    /// Opaque payload handed to the executor.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Hooks; never serialized.
    #[serde(skip)]
    pub callbacks: TaskCallbacks,
}

impl TaskConfig {
    /// Task with an explicit identifier at normal priority.
    pub fn new(id: impl Into<TaskId>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            priority: Priority::Normal,
            timeout_ms: None,
            max_retries: None,
            category: None,
            metadata: None,
            callbacks: TaskCallbacks::default(),
        }
    }

    /// Task with a generated UUID v4 identifier.
    pub fn anonymous(target: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), target)
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the category label.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Attach opaque metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Hook called after a successful attempt.
    #[must_use]
    pub fn on_complete(mut self, f: impl Fn(&TaskId, Duration) + Send + Sync + 'static) -> Self {
        self.callbacks.on_complete = Some(Arc::new(f));
        self
    }

    /// Hook called after each failed attempt.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&TaskId, &SchedulerError) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Hook called on each progress report.
    #[must_use]
    pub fn on_progress(mut self, f: impl Fn(&ProgressUpdate) + Send + Sync + 'static) -> Self {
        self.callbacks.on_progress = Some(Arc::new(f));
        self
    }

    /// Merge with queue defaults. The only place defaults are applied.
    pub fn resolve(self, defaults: &QueueConfig) -> ResolvedTaskConfig {
        ResolvedTaskConfig {
            id: self.id,
            target: self.target,
            priority: self.priority,
            timeout: self
                .timeout_ms
                .map_or_else(|| defaults.default_timeout(), Duration::from_millis),
            max_retries: self.max_retries.unwrap_or(defaults.default_max_retries),
            category: self.category,
            metadata: self.metadata,
            callbacks: self.callbacks,
        }
    }
}

/// Fully populated task configuration.
#[derive(Debug, Clone)]
pub struct ResolvedTaskConfig {
    /// Unique identifier.
    pub id: TaskId,
    /// Opaque target.
    pub target: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retry budget.
    pub max_retries: u32,
    /// Grouping label.
    pub category: Option<String>,
    /// Opaque payload.
    pub metadata: Option<serde_json::Value>,
    /// Hooks.
    pub callbacks: TaskCallbacks,
}

/// Envelope produced when an attempt ends.
#[derive(Debug, Clone)]
pub struct TaskResult<T> {
    /// Task identifier.
    pub task_id: TaskId,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Executor output on success.
    pub data: Option<T>,
    /// Error on failure.
    pub error: Option<SchedulerError>,
    /// Duration of the attempt.
    pub execution_time: Duration,
    /// Retries used when the result was produced.
    pub retry_count: u32,
    /// Always false here; kept for callers that layer a cache in front.
    pub from_cache: bool,
    /// Task status when the result was produced.
    pub status: TaskStatus,
}

impl<T> TaskResult<T> {
    /// Successful result.
    pub fn success(task_id: TaskId, data: T, execution_time: Duration, retry_count: u32) -> Self {
        Self {
            task_id,
            success: true,
            data: Some(data),
            error: None,
            execution_time,
            retry_count,
            from_cache: false,
            status: TaskStatus::Completed,
        }
    }

    /// Failed result.
    pub const fn failure(
        task_id: TaskId,
        error: SchedulerError,
        execution_time: Duration,
        retry_count: u32,
        status: TaskStatus,
    ) -> Self {
        Self {
            task_id,
            success: false,
            data: None,
            error: Some(error),
            execution_time,
            retry_count,
            from_cache: false,
            status,
        }
    }
}

/// Settled outcome delivered to every handle of a task.
pub type TaskOutcome<T> = Result<TaskResult<T>, SchedulerError>;

/// Mutable bookkeeping of a live task.
#[derive(Debug)]
struct TaskState<T> {
    status: TaskStatus,
    started_at_ms: Option<u128>,
    completed_at_ms: Option<u128>,
    attempt_started: Option<Instant>,
    execution_time: Duration,
    retry_count: u32,
    last_error: Option<SchedulerError>,
    result: Option<T>,
}

/// Point-in-time copy of a task's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Retries used so far.
    pub retry_count: u32,
    /// Start of the latest attempt, ms since epoch.
    pub started_at_ms: Option<u128>,
    /// End of the latest attempt, ms since epoch.
    pub completed_at_ms: Option<u128>,
    /// Accumulated execution time over all attempts.
    pub execution_time: Duration,
    /// Most recent error.
    pub last_error: Option<SchedulerError>,
}

/// A scheduled unit of work.
///
/// Shared as `Arc<Task<T>>` between the queue and its runner. The task owns
/// the send side of its completion slot; callers hold [`TaskHandle`]s.
pub struct Task<T> {
    config: ResolvedTaskConfig,
    cancellation: CancellationToken,
    state: Mutex<TaskState<T>>,
    completion: watch::Sender<Option<TaskOutcome<T>>>,
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Task")
            .field("id", &self.config.id)
            .field("priority", &self.config.priority)
            .field("status", &state.status)
            .field("retry_count", &state.retry_count)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> Task<T> {
    /// New task in `Pending`.
    pub fn new(config: ResolvedTaskConfig) -> Self {
        let (completion, _) = watch::channel(None);
        Self {
            config,
            cancellation: CancellationToken::new(),
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                started_at_ms: None,
                completed_at_ms: None,
                attempt_started: None,
                execution_time: Duration::ZERO,
                retry_count: 0,
                last_error: None,
                result: None,
            }),
            completion,
        }
    }

    /// Task identifier.
    pub fn id(&self) -> &TaskId {
        &self.config.id
    }

    /// Task priority.
    pub const fn priority(&self) -> Priority {
        self.config.priority
    }

    /// Resolved configuration.
    pub const fn config(&self) -> &ResolvedTaskConfig {
        &self.config
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        self.state.lock().status
    }

    /// Retries used so far.
    pub fn retry_count(&self) -> u32 {
        self.state.lock().retry_count
    }

    /// Most recent error.
    pub fn last_error(&self) -> Option<SchedulerError> {
        self.state.lock().last_error.clone()
    }

    /// Output of the successful attempt, if any.
    pub fn result(&self) -> Option<T> {
        self.state.lock().result.clone()
    }

    /// Task-level cancellation token. Attempt tokens are children of it.
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Copy of the current bookkeeping.
    pub fn snapshot(&self) -> TaskSnapshot {
        let state = self.state.lock();
        TaskSnapshot {
            id: self.config.id.clone(),
            status: state.status,
            priority: self.config.priority,
            retry_count: state.retry_count,
            started_at_ms: state.started_at_ms,
            completed_at_ms: state.completed_at_ms,
            execution_time: state.execution_time,
            last_error: state.last_error.clone(),
        }
    }

    /// A new handle on this task's completion slot.
    pub fn handle(&self) -> TaskHandle<T> {
        TaskHandle {
            task_id: self.config.id.clone(),
            rx: self.completion.subscribe(),
        }
    }

    /// The settled outcome, once the completion slot has been filled.
    pub fn outcome(&self) -> Option<TaskOutcome<T>> {
        self.completion.borrow().clone()
    }

    pub(crate) fn set_status(&self, status: TaskStatus) {
        self.state.lock().status = status;
    }

    /// Cancel the task token and mark `Cancelled`. Idempotent.
    pub(crate) fn cancel(&self) {
        self.cancellation.cancel();
        self.state.lock().status = TaskStatus::Cancelled;
    }

    /// Move to `Running` unless cancelled in the meantime; returns the attempt
    /// token, or `None` if the task was cancelled.
    pub(crate) fn begin_attempt(&self) -> Option<CancellationToken> {
        let mut state = self.state.lock();
        if state.status.is_final() {
            return None;
        }
        state.status = TaskStatus::Running;
        state.started_at_ms = Some(now_ms());
        state.attempt_started = Some(Instant::now());
        Some(self.cancellation.child_token())
    }

    /// Record a successful attempt. Returns the attempt duration and retry
    /// count, or `None` if the task was cancelled while running.
    pub(crate) fn finish_success(&self, data: &T) -> Option<(Duration, u32)> {
        let mut state = self.state.lock();
        let elapsed = close_attempt(&mut state);
        if state.status == TaskStatus::Cancelled {
            return None;
        }
        state.status = TaskStatus::Completed;
        state.result = Some(data.clone());
        Some((elapsed, state.retry_count))
    }

    /// Record a failed attempt. Keeps a final status if already set;
    /// otherwise `Timeout`, `Cancelled` or `Failed` by error kind.
    pub(crate) fn finish_failure(&self, error: &SchedulerError) -> (Duration, u32, TaskStatus) {
        let mut state = self.state.lock();
        let elapsed = close_attempt(&mut state);
        if !state.status.is_final() {
            state.status = match error {
                SchedulerError::Timeout { .. } => TaskStatus::Timeout,
                SchedulerError::Cancelled(_) | SchedulerError::QueueCleared(_) => {
                    TaskStatus::Cancelled
                }
                _ => TaskStatus::Failed,
            };
        }
        state.last_error = Some(error.clone());
        (elapsed, state.retry_count, state.status)
    }

    /// Consume one unit of retry budget and return to `Pending`. Returns the
    /// new retry count, or `None` if the budget is spent or the task is not
    /// in a retryable status.
    pub(crate) fn prepare_retry(&self) -> Option<u32> {
        let mut state = self.state.lock();
        if !state.status.is_retryable() || state.retry_count >= self.config.max_retries {
            return None;
        }
        state.retry_count += 1;
        state.status = TaskStatus::Pending;
        Some(state.retry_count)
    }

    /// Fill the completion slot. The first outcome wins; later calls are
    /// ignored and return false.
    pub(crate) fn settle(&self, outcome: TaskOutcome<T>) -> bool {
        self.completion.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }
}

fn close_attempt<T>(state: &mut TaskState<T>) -> Duration {
    let elapsed = state
        .attempt_started
        .take()
        .map_or(Duration::ZERO, |start| start.elapsed());
    state.execution_time += elapsed;
    state.completed_at_ms = Some(now_ms());
    elapsed
}

/// Caller's side of a task's completion slot.
///
/// Every submission of the same identifier yields a handle on the same slot.
#[derive(Debug)]
pub struct TaskHandle<T> {
    task_id: TaskId,
    rx: watch::Receiver<Option<TaskOutcome<T>>>,
}

impl<T: Clone> TaskHandle<T> {
    /// Identifier of the awaited task.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Outcome if already settled.
    pub fn try_outcome(&self) -> Option<TaskOutcome<T>> {
        self.rx.borrow().clone()
    }

    /// Wait until the task settles.
    ///
    /// Resolves with the successful [`TaskResult`], or the terminal error
    /// once retries are exhausted or the task is cancelled.
    pub async fn wait(mut self) -> TaskOutcome<T> {
        let settled = match self.rx.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| Err(SchedulerError::Cancelled(self.task_id)))
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            task_id: self.task_id.clone(),
            rx: self.rx.clone(),
        }
    }
}
