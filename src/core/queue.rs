//! Pending/running/completed bookkeeping with priority-ordered insertion and
//! weighted random selection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::QueueConfig;
use crate::core::events::{EventPublisher, SchedulerEvent};
use crate::core::task::{Task, TaskConfig, TaskResult, TaskStatus};
use crate::core::SchedulerError;
use crate::util::serde::TaskId;

/// Side-effect free snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Tasks waiting to be selected.
    pub pending: usize,
    /// Tasks currently executing.
    pub running: usize,
    /// Results held in the completed cache.
    pub completed: usize,
    /// Concurrency budget.
    pub max_concurrent: usize,
    /// Pending capacity.
    pub max_queue_size: usize,
}

struct QueueState<T> {
    /// Priority-descending, FIFO within a priority.
    pending: Vec<Arc<Task<T>>>,
    running: HashMap<TaskId, Arc<Task<T>>>,
    completed: HashMap<TaskId, TaskResult<T>>,
    completed_order: VecDeque<TaskId>,
    rng: StdRng,
}

impl<T: Clone> QueueState<T> {
    fn find(&self, id: &str) -> Option<&Arc<Task<T>>> {
        self.pending
            .iter()
            .find(|t| t.id() == id)
            .or_else(|| self.running.get(id))
    }

    /// Place `task` before the first pending task of strictly lower priority.
    fn insert_by_priority(&mut self, task: Arc<Task<T>>) {
        let priority = task.priority();
        let index = self
            .pending
            .iter()
            .position(|t| t.priority() < priority)
            .unwrap_or(self.pending.len());
        self.pending.insert(index, task);
    }
}

/// Holds not-yet-running tasks and tracks running and finished ones.
///
/// All state sits behind one mutex that is never held across an await, so
/// every operation is atomic relative to the others.
pub struct AsyncQueue<T> {
    config: QueueConfig,
    state: Mutex<QueueState<T>>,
    events: EventPublisher,
}

impl<T: Clone + Send + Sync + 'static> AsyncQueue<T> {
    /// Queue seeded from OS entropy.
    pub fn new(config: QueueConfig, events: EventPublisher) -> Self {
        Self::with_rng(config, events, StdRng::from_os_rng())
    }

    /// Queue with a fixed RNG seed, for reproducible selection.
    pub fn with_seed(config: QueueConfig, events: EventPublisher, seed: u64) -> Self {
        Self::with_rng(config, events, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: QueueConfig, events: EventPublisher, rng: StdRng) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: Vec::with_capacity(config.max_queue_size.min(1024)),
                running: HashMap::new(),
                completed: HashMap::new(),
                completed_order: VecDeque::new(),
                rng,
            }),
            config,
            events,
        }
    }

    /// Queue configuration.
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a task, or return the live task already using this identifier.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::QueueFull`] when the pending list is at capacity.
    pub fn enqueue(&self, config: TaskConfig) -> Result<Arc<Task<T>>, SchedulerError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.find(&config.id) {
            tracing::debug!(task_id = %config.id, "duplicate submission, returning live task");
            return Ok(Arc::clone(existing));
        }
        if state.pending.len() >= self.config.max_queue_size {
            tracing::warn!(
                task_id = %config.id,
                pending = state.pending.len(),
                "task rejected: queue full"
            );
            return Err(SchedulerError::QueueFull(self.config.max_queue_size));
        }

        let task = Arc::new(Task::new(config.resolve(&self.config)));
        state.insert_by_priority(Arc::clone(&task));
        let pending = state.pending.len();
        drop(state);

        tracing::debug!(task_id = %task.id(), priority = %task.priority(), pending, "task enqueued");
        self.events.publish(SchedulerEvent::Enqueued {
            task_id: task.id().clone(),
            priority: task.priority(),
            pending,
        });
        Ok(task)
    }

    /// Select and remove one pending task by weighted random draw and mark it
    /// `Queued`. Higher weights dominate without starving lower priorities.
    pub fn dequeue(&self) -> Option<Arc<Task<T>>> {
        let mut state = self.state.lock();
        let task = self.select_locked(&mut state)?;
        let (pending, running) = (state.pending.len(), state.running.len());
        drop(state);
        self.publish_dequeued(&task, pending, running);
        Some(task)
    }

    /// Dequeue and mark running in one step, only if a concurrency slot is
    /// free. Used by the dispatch loop so no other operation can observe the
    /// task between the two.
    pub fn dequeue_for_run(&self) -> Option<Arc<Task<T>>> {
        let mut state = self.state.lock();
        if state.running.len() >= self.config.max_concurrent {
            return None;
        }
        let task = self.select_locked(&mut state)?;
        let (pending, running) = (state.pending.len(), state.running.len());
        state.running.insert(task.id().clone(), Arc::clone(&task));
        drop(state);
        self.publish_dequeued(&task, pending, running);
        Some(task)
    }

    fn select_locked(&self, state: &mut QueueState<T>) -> Option<Arc<Task<T>>> {
        if state.pending.is_empty() {
            return None;
        }
        let weights = self.config.priority_weights;
        let cumulative: Vec<u64> = state
            .pending
            .iter()
            .scan(0_u64, |acc, t| {
                *acc += u64::from(weights.weight(t.priority()));
                Some(*acc)
            })
            .collect();
        let total = cumulative.last().copied().unwrap_or(0);
        let index = if total == 0 {
            0
        } else {
            let draw = state.rng.random_range(0..total);
            cumulative.partition_point(|&c| c <= draw)
        };
        let task = state.pending.remove(index);
        task.set_status(TaskStatus::Queued);
        Some(task)
    }

    fn publish_dequeued(&self, task: &Arc<Task<T>>, pending: usize, running: usize) {
        tracing::debug!(task_id = %task.id(), pending, running, "task dequeued");
        self.events.publish(SchedulerEvent::Dequeued {
            task_id: task.id().clone(),
            pending,
            running,
        });
    }

    /// Remove a task by identifier.
    ///
    /// A pending task is dropped and its handles reject with
    /// [`SchedulerError::Cancelled`]. A running task has its cancellation
    /// token fired, is marked `Cancelled` and is no longer tracked as running.
    /// Returns false for unknown identifiers.
    pub fn remove_task(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let task = if let Some(index) = state.pending.iter().position(|t| t.id() == id) {
            state.pending.remove(index)
        } else if let Some(task) = state.running.remove(id) {
            task
        } else {
            return false;
        };
        task.cancel();
        drop(state);

        task.settle(Err(SchedulerError::Cancelled(task.id().clone())));
        tracing::info!(task_id = %id, "task cancelled");
        true
    }

    /// Track `task` as running.
    pub fn mark_as_running(&self, task: Arc<Task<T>>) {
        let mut state = self.state.lock();
        state.running.insert(task.id().clone(), task);
    }

    /// Move a running task's result into the completed cache, evicting the
    /// oldest entry beyond capacity. Returns false if the task was no longer
    /// tracked as running (cancelled or cleared meanwhile); nothing is
    /// recorded then.
    pub fn mark_as_completed(&self, id: &str, result: TaskResult<T>) -> bool {
        let mut state = self.state.lock();
        if state.running.remove(id).is_none() {
            return false;
        }
        if state.completed.insert(id.to_string(), result).is_none() {
            state.completed_order.push_back(id.to_string());
        }
        while state.completed_order.len() > self.config.completed_cache_size {
            if let Some(oldest) = state.completed_order.pop_front() {
                state.completed.remove(&oldest);
            }
        }
        true
    }

    /// Put a failed running task back in the pending list at its original
    /// priority position, consuming one unit of retry budget.
    ///
    /// Returns the new retry count, or `None` when the task was cancelled,
    /// is no longer running, or has no budget left. Capacity is not checked:
    /// a retry is not a new submission.
    pub fn requeue(&self, task: &Arc<Task<T>>) -> Option<u32> {
        let mut state = self.state.lock();
        if !state.running.contains_key(task.id()) {
            return None;
        }
        let retry_count = task.prepare_retry()?;
        state.running.remove(task.id());
        state.insert_by_priority(Arc::clone(task));
        Some(retry_count)
    }

    /// Reject every pending and running task with
    /// [`SchedulerError::QueueCleared`], mark them `Cancelled` and empty all
    /// collections.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let mut drained: Vec<Arc<Task<T>>> = state.pending.drain(..).collect();
        drained.extend(state.running.drain().map(|(_, task)| task));
        state.completed.clear();
        state.completed_order.clear();
        drop(state);

        for task in &drained {
            task.cancel();
            task.settle(Err(SchedulerError::QueueCleared(task.id().clone())));
        }
        if !drained.is_empty() {
            tracing::info!(rejected = drained.len(), "queue cleared");
        }
        drained.len()
    }

    /// Occupancy snapshot.
    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock();
        QueueStatus {
            pending: state.pending.len(),
            running: state.running.len(),
            completed: state.completed.len(),
            max_concurrent: self.config.max_concurrent,
            max_queue_size: self.config.max_queue_size,
        }
    }

    /// Live (pending or running) task by identifier.
    pub fn get_task(&self, id: &str) -> Option<Arc<Task<T>>> {
        self.state.lock().find(id).cloned()
    }

    /// Cached result of a finished task.
    pub fn get_result(&self, id: &str) -> Option<TaskResult<T>> {
        self.state.lock().completed.get(id).cloned()
    }

    /// Status of a live task, or the terminal status of a cached result.
    pub fn task_status(&self, id: &str) -> Option<TaskStatus> {
        let state = self.state.lock();
        state
            .find(id)
            .map(|t| t.status())
            .or_else(|| state.completed.get(id).map(|r| r.status))
    }

    /// Pending identifiers in list order.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|t| t.id().clone())
            .collect()
    }
}
