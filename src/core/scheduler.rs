//! Task scheduler: owns the queue and a concurrency budget, and runs a
//! polling dispatch loop while started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::core::events::{EventPublisher, SchedulerEvent};
use crate::core::executor::{Spawn, TaskExecutor};
use crate::core::queue::{AsyncQueue, QueueStatus};
use crate::core::runner::TaskRunner;
use crate::core::task::{Task, TaskConfig, TaskHandle, TaskResult, TaskStatus};
use crate::core::SchedulerError;

struct SchedulerInner<T, E, S> {
    queue: AsyncQueue<T>,
    executor: E,
    spawner: S,
    events: EventPublisher,
    running: AtomicBool,
    /// Stops the current dispatch loop; replaced on every `start`.
    loop_token: Mutex<Option<CancellationToken>>,
}

/// Coordinates concurrent task execution.
///
/// Tasks are submitted with [`schedule`](Self::schedule) and picked up by
/// the dispatch loop once [`start`](Self::start) has been called. The loop
/// polls the queue every `poll_interval_ms` and spawns each attempt without
/// waiting for it. Failed attempts are retried at their original priority
/// until the retry budget runs out.
///
/// Each loop iteration dispatches as many tasks as there are free
/// concurrency slots, each picked by its own weighted random draw, rather
/// than one task per iteration. A burst of submissions therefore starts
/// within one poll interval instead of one interval per task.
pub struct TaskScheduler<T, E, S> {
    inner: Arc<SchedulerInner<T, E, S>>,
}

impl<T, E, S> Clone for TaskScheduler<T, E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E, S> TaskScheduler<T, E, S>
where
    T: Clone + Send + Sync + 'static,
    E: TaskExecutor<T>,
    S: Spawn + Send + Sync + 'static,
{
    /// Create a stopped scheduler. Use
    /// [`SchedulerBuilder`](crate::builders::SchedulerBuilder) to validate the
    /// configuration first.
    pub fn new(config: QueueConfig, executor: E, spawner: S, events: EventPublisher) -> Self {
        let queue = AsyncQueue::new(config, events.clone());
        Self::from_queue(queue, executor, spawner, events)
    }

    /// Create a stopped scheduler around an existing queue.
    pub fn from_queue(queue: AsyncQueue<T>, executor: E, spawner: S, events: EventPublisher) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queue,
                executor,
                spawner,
                events,
                running: AtomicBool::new(false),
                loop_token: Mutex::new(None),
            }),
        }
    }

    /// Start the dispatch loop. Warns and does nothing if already running.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            tracing::warn!("scheduler already running");
            return;
        }
        let token = CancellationToken::new();
        if let Some(previous) = self.inner.loop_token.lock().replace(token.clone()) {
            previous.cancel();
        }
        tracing::info!(
            max_concurrent = self.inner.queue.config().max_concurrent,
            "scheduler started"
        );
        let inner = Arc::clone(&self.inner);
        self.inner.spawner.spawn(Self::dispatch_loop(inner, token));
    }

    /// Stop the dispatch loop. In-flight tasks keep running.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = self.inner.loop_token.lock().take() {
            token.cancel();
        }
        tracing::info!("scheduler stopped");
    }

    /// Whether the dispatch loop is active.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Submit a task and get a handle on its outcome.
    ///
    /// Submitting an identifier that is already pending or running returns a
    /// handle on the existing task.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::QueueFull`] when the pending list is at capacity.
    pub fn schedule(&self, config: TaskConfig) -> Result<TaskHandle<T>, SchedulerError> {
        self.inner.queue.enqueue(config).map(|task| task.handle())
    }

    /// Submit several tasks and wait for all of them to settle.
    ///
    /// Never fails: rejected submissions and failed tasks become failure
    /// entries, in input order.
    pub async fn schedule_batch(&self, configs: Vec<TaskConfig>) -> Vec<TaskResult<T>> {
        let waits = configs.into_iter().map(|config| {
            let id = config.id.clone();
            let submitted = self.schedule(config);
            async move {
                let outcome = match submitted {
                    Ok(handle) => handle.wait().await,
                    Err(err) => Err(err),
                };
                outcome.unwrap_or_else(|err| {
                    TaskResult::failure(id, err, Duration::ZERO, 0, TaskStatus::Failed)
                })
            }
        });
        join_all(waits).await
    }

    /// Cancel a pending or running task. Returns false if unknown.
    pub fn cancel(&self, id: &str) -> bool {
        self.inner.queue.remove_task(id)
    }

    /// Status of a live task or of a cached result.
    pub fn get_task_status(&self, id: &str) -> Option<TaskStatus> {
        self.inner.queue.task_status(id)
    }

    /// Cached result of a finished task.
    pub fn get_result(&self, id: &str) -> Option<TaskResult<T>> {
        self.inner.queue.get_result(id)
    }

    /// Queue occupancy snapshot.
    pub fn get_status(&self) -> QueueStatus {
        self.inner.queue.status()
    }

    /// The underlying queue.
    pub fn queue(&self) -> &AsyncQueue<T> {
        &self.inner.queue
    }

    /// Stop the loop and reject everything pending or running.
    pub fn destroy(&self) {
        self.stop();
        let rejected = self.inner.queue.clear();
        tracing::info!(rejected, "scheduler destroyed");
    }

    async fn dispatch_loop(inner: Arc<SchedulerInner<T, E, S>>, token: CancellationToken) {
        let interval = inner.queue.config().poll_interval();
        tracing::debug!(poll_ms = inner.queue.config().poll_interval_ms, "dispatch loop running");
        while !token.is_cancelled() {
            Self::dispatch_ready(&inner);
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        tracing::debug!("dispatch loop exited");
    }

    /// Launch pending tasks while concurrency slots are free.
    fn dispatch_ready(inner: &Arc<SchedulerInner<T, E, S>>) {
        while let Some(task) = inner.queue.dequeue_for_run() {
            let inner_clone = Arc::clone(inner);
            inner
                .spawner
                .spawn(async move { Self::run_task(inner_clone, task).await });
        }
    }

    async fn run_task(inner: Arc<SchedulerInner<T, E, S>>, task: Arc<Task<T>>) {
        let runner = TaskRunner::new(Arc::clone(&task), inner.events.clone());
        match runner.execute(&inner.executor).await {
            Ok(result) => Self::on_success(&inner, &task, result),
            Err(result) => Self::on_failure(&inner, &task, result),
        }
    }

    fn on_success(inner: &SchedulerInner<T, E, S>, task: &Arc<Task<T>>, result: TaskResult<T>) {
        let id = task.id().clone();
        let execution_ms = u64::try_from(result.execution_time.as_millis()).unwrap_or(u64::MAX);
        let retry_count = result.retry_count;
        if !inner.queue.mark_as_completed(&id, result.clone()) {
            Self::report_removed(inner, task, retry_count);
            return;
        }
        task.settle(Ok(result));
        tracing::info!(task_id = %id, execution_ms, retry_count, "task completed");
        inner.events.publish(SchedulerEvent::Completed {
            task_id: id,
            execution_ms,
            retry_count,
        });
    }

    /// Retry while the error is retryable, budget remains and the task was
    /// not cancelled; otherwise settle with the terminal error.
    fn on_failure(inner: &SchedulerInner<T, E, S>, task: &Arc<Task<T>>, result: TaskResult<T>) {
        let id = task.id().clone();
        let error = result
            .error
            .clone()
            .unwrap_or_else(|| SchedulerError::Cancelled(id.clone()));
        let retry = if error.is_retryable() {
            inner.queue.requeue(task)
        } else {
            None
        };
        if let Some(retry_count) = retry {
            let max_retries = task.config().max_retries;
            tracing::warn!(
                task_id = %id,
                retry_count,
                max_retries,
                error = %error,
                "task failed, retrying"
            );
            inner.events.publish(SchedulerEvent::Retry {
                task_id: id,
                retry_count,
                max_retries,
            });
            return;
        }

        let retry_count = result.retry_count;
        if !inner.queue.mark_as_completed(&id, result) {
            Self::report_removed(inner, task, retry_count);
            return;
        }
        task.settle(Err(error.clone()));
        tracing::error!(task_id = %id, retry_count, error = %error, "task failed permanently");
        inner.events.publish(SchedulerEvent::Failed {
            task_id: id,
            error: error.to_string(),
            retry_count,
        });
    }

    /// The attempt ended after `cancel` or `clear` had already removed the
    /// task and settled its handles. Report the error those handles got.
    fn report_removed(inner: &SchedulerInner<T, E, S>, task: &Arc<Task<T>>, retry_count: u32) {
        let id = task.id().clone();
        let error = match task.outcome() {
            Some(Err(error)) => error,
            _ => SchedulerError::Cancelled(id.clone()),
        };
        tracing::info!(task_id = %id, error = %error, "attempt ended after task was removed");
        inner.events.publish(SchedulerEvent::Failed {
            task_id: id,
            error: error.to_string(),
            retry_count,
        });
    }
}
