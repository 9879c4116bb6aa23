//! Advisory scheduler notifications.
//!
//! Events are fire-and-forget: the scheduler never depends on a sink
//! consuming them. A sink is injected at construction instead of relying on a
//! process-wide bus.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::task::ProgressCallback;
use crate::util::serde::{Priority, TaskId};

/// Progress reported by an executor while a task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Task reporting progress.
    pub task_id: TaskId,
    /// Units done so far.
    pub loaded: u64,
    /// Expected total units; 0 when unknown.
    pub total: u64,
    /// `loaded / total * 100`, or 0 when `total` is 0.
    pub percentage: f64,
    /// Free-form stage label such as `"download"` or `"decode"`.
    pub stage: String,
}

impl ProgressUpdate {
    /// Build an update, guarding against a zero total.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(task_id: impl Into<TaskId>, loaded: u64, total: u64, stage: impl Into<String>) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            loaded as f64 / total as f64 * 100.0
        };
        Self {
            task_id: task_id.into(),
            loaded,
            total,
            percentage,
            stage: stage.into(),
        }
    }
}

/// Scheduler lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A new task entered the pending list.
    Enqueued {
        /// Task identifier.
        task_id: TaskId,
        /// Task priority.
        priority: Priority,
        /// Pending count after insertion.
        pending: usize,
    },
    /// A task was selected out of the pending list.
    Dequeued {
        /// Task identifier.
        task_id: TaskId,
        /// Pending count after removal.
        pending: usize,
        /// Running count at selection time.
        running: usize,
    },
    /// Executor progress.
    Progress(ProgressUpdate),
    /// A task finished successfully.
    Completed {
        /// Task identifier.
        task_id: TaskId,
        /// Duration of the successful attempt.
        execution_ms: u64,
        /// Retries used before success.
        retry_count: u32,
    },
    /// A task failed terminally.
    Failed {
        /// Task identifier.
        task_id: TaskId,
        /// Rendered terminal error.
        error: String,
        /// Retries used before giving up.
        retry_count: u32,
    },
    /// A failed task was put back in the pending list.
    Retry {
        /// Task identifier.
        task_id: TaskId,
        /// Retry number now starting (1-based).
        retry_count: u32,
        /// Retry budget.
        max_retries: u32,
    },
}

impl SchedulerEvent {
    /// Identifier of the task this event concerns.
    pub fn task_id(&self) -> &str {
        match self {
            Self::Enqueued { task_id, .. }
            | Self::Dequeued { task_id, .. }
            | Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::Retry { task_id, .. } => task_id,
            Self::Progress(update) => &update.task_id,
        }
    }

    /// Short event name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Dequeued { .. } => "dequeued",
            Self::Progress(_) => "progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Retry { .. } => "retry",
        }
    }
}

/// Receiver of scheduler events.
pub trait EventSink: Send {
    /// Record an event. Must not block for long; called from scheduling paths.
    fn record(&mut self, event: SchedulerEvent);
}

/// Bounded in-memory sink for tests and diagnostics.
///
/// Clones share one buffer, so a caller can keep a handle after boxing a
/// clone into the scheduler.
#[derive(Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<SchedulerEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink that keeps at most `max_events`, dropping the oldest.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events concerning one task.
    pub fn events_for(&self, task_id: &str) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task_id() == task_id)
            .cloned()
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: SchedulerEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards every event to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&mut self, event: SchedulerEvent) {
        tracing::debug!(
            event = event.name(),
            task_id = event.task_id(),
            detail = ?event,
            "scheduler event"
        );
    }
}

/// Shared handle used by the queue, runners and scheduler to publish events.
#[derive(Clone, Default)]
pub struct EventPublisher {
    sink: Option<Arc<Mutex<Box<dyn EventSink>>>>,
}

impl EventPublisher {
    /// Publisher backed by `sink`.
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self {
            sink: Some(Arc::new(Mutex::new(sink))),
        }
    }

    /// Publisher that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Publish an event if a sink is attached.
    pub fn publish(&self, event: SchedulerEvent) {
        if let Some(sink) = &self.sink {
            sink.lock().record(event);
        }
    }
}

/// Handle given to executors for reporting progress.
///
/// Purely observational: reporting never touches scheduling state.
#[derive(Clone)]
pub struct ProgressReporter {
    task_id: TaskId,
    callback: Option<ProgressCallback>,
    events: EventPublisher,
}

impl ProgressReporter {
    pub(crate) fn new(task_id: TaskId, callback: Option<ProgressCallback>, events: EventPublisher) -> Self {
        Self {
            task_id,
            callback,
            events,
        }
    }

    /// Report `loaded` of `total` units for `stage`.
    pub fn update(&self, loaded: u64, total: u64, stage: &str) -> ProgressUpdate {
        let update = ProgressUpdate::new(self.task_id.clone(), loaded, total, stage);
        tracing::trace!(
            task_id = %self.task_id,
            loaded,
            total,
            stage,
            "task progress"
        );
        if let Some(callback) = &self.callback {
            callback(&update);
        }
        self.events.publish(SchedulerEvent::Progress(update.clone()));
        update
    }
}
