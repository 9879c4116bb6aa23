//! Runs a single task attempt against the executor with a timeout race.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::core::events::{EventPublisher, ProgressReporter, ProgressUpdate};
use crate::core::executor::{TaskContext, TaskExecutor};
use crate::core::task::{Task, TaskResult, TaskStatus};
use crate::core::SchedulerError;

/// Executes one task to the end of one attempt.
///
/// `execute` returns `Err(TaskResult)` on failure so the scheduler can make
/// its retry decision on structured data.
pub struct TaskRunner<T> {
    task: Arc<Task<T>>,
    progress: ProgressReporter,
}

impl<T: Clone + Send + Sync + 'static> TaskRunner<T> {
    /// Runner for `task`, publishing progress to `events`.
    pub fn new(task: Arc<Task<T>>, events: EventPublisher) -> Self {
        let progress = ProgressReporter::new(
            task.id().clone(),
            task.config().callbacks.on_progress.clone(),
            events,
        );
        Self { task, progress }
    }

    /// The task being run.
    pub const fn task(&self) -> &Arc<Task<T>> {
        &self.task
    }

    /// Run one attempt.
    ///
    /// The executor races a timer of the task's timeout; when the timer wins
    /// the attempt token is cancelled and the attempt fails with
    /// [`SchedulerError::Timeout`]. Explicit cancellation also ends the race.
    /// A panicking executor fails the attempt with
    /// [`SchedulerError::Executor`] like any other executor error.
    pub async fn execute<E>(&self, executor: &E) -> Result<TaskResult<T>, TaskResult<T>>
    where
        E: TaskExecutor<T> + ?Sized,
    {
        let task = &self.task;
        let id = task.id().clone();
        let Some(attempt) = task.begin_attempt() else {
            tracing::debug!(task_id = %id, "task cancelled before start");
            return Err(self.fail(SchedulerError::Cancelled(id)));
        };

        let config = task.config();
        let ctx = TaskContext::new(
            id.clone(),
            config.target.clone(),
            config.priority,
            config.category.clone(),
            config.metadata.clone(),
            task.retry_count(),
            attempt.clone(),
            self.progress.clone(),
        );
        let timeout = config.timeout;
        tracing::debug!(
            task_id = %id,
            priority = %config.priority,
            timeout_ms = millis(timeout),
            retry = task.retry_count(),
            "task attempt started"
        );

        let outcome = tokio::select! {
            res = AssertUnwindSafe(executor.execute(ctx)).catch_unwind() => match res {
                Ok(res) => res.map_err(|e| SchedulerError::executor(id.clone(), &e)),
                Err(payload) => Err(SchedulerError::Executor {
                    task_id: id.clone(),
                    message: format!("executor panicked: {}", panic_message(&*payload)),
                }),
            },
            () = tokio::time::sleep(timeout) => {
                attempt.cancel();
                Err(SchedulerError::Timeout {
                    task_id: id.clone(),
                    timeout_ms: millis(timeout),
                })
            }
            () = attempt.cancelled() => Err(SchedulerError::Cancelled(id.clone())),
        };

        match outcome {
            Ok(data) => self.succeed(data),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn succeed(&self, data: T) -> Result<TaskResult<T>, TaskResult<T>> {
        let id = self.task.id().clone();
        let Some((elapsed, retry_count)) = self.task.finish_success(&data) else {
            tracing::debug!(task_id = %id, "discarding result of cancelled task");
            return Err(self.fail(SchedulerError::Cancelled(id)));
        };
        tracing::debug!(task_id = %id, elapsed_ms = millis(elapsed), "task attempt succeeded");
        if let Some(callback) = &self.task.config().callbacks.on_complete {
            callback(&id, elapsed);
        }
        Ok(TaskResult::success(id, data, elapsed, retry_count))
    }

    fn fail(&self, err: SchedulerError) -> TaskResult<T> {
        let id = self.task.id().clone();
        let (elapsed, retry_count, status) = self.task.finish_failure(&err);
        if status == TaskStatus::Timeout {
            tracing::warn!(task_id = %id, error = %err, "task attempt timed out");
        } else {
            tracing::debug!(task_id = %id, error = %err, %status, "task attempt failed");
        }
        if let Some(callback) = &self.task.config().callbacks.on_error {
            callback(&id, &err);
        }
        TaskResult::failure(id, err, elapsed, retry_count, status)
    }

    /// Cancel the task. Idempotent and safe after completion.
    pub fn cancel(&self) {
        self.task.cancel();
    }

    /// Report progress for the task. Never affects scheduling state.
    pub fn update_progress(&self, loaded: u64, total: u64, stage: &str) -> ProgressUpdate {
        self.progress.update(loaded, total, stage)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[allow(clippy::cast_possible_truncation)]
const fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
