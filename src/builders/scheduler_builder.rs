//! Builder that validates configuration and wires a scheduler together.

use crate::config::QueueConfig;
use crate::core::{
    AsyncQueue, EventPublisher, EventSink, SchedulerError, Spawn, TaskExecutor, TaskScheduler,
};
use crate::runtime::TokioSpawner;

/// Assembles a [`TaskScheduler`].
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(loader)
///     .config(QueueConfig::from_env()?)
///     .event_sink(Box::new(TracingEventSink))
///     .build()?;
/// scheduler.start();
/// ```
pub struct SchedulerBuilder<E> {
    executor: E,
    config: QueueConfig,
    sink: Option<Box<dyn EventSink>>,
    seed: Option<u64>,
}

impl<E> SchedulerBuilder<E> {
    /// Builder with default configuration and no event sink.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            config: QueueConfig::default(),
            sink: None,
            seed: None,
        }
    }

    /// Use this queue configuration.
    #[must_use]
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish advisory events to `sink`.
    #[must_use]
    pub fn event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Seed weighted selection for reproducible runs.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if validation fails, or
    /// [`SchedulerError::Runtime`] outside a tokio runtime.
    pub fn build<T>(self) -> Result<TaskScheduler<T, E, TokioSpawner>, SchedulerError>
    where
        T: Clone + Send + Sync + 'static,
        E: TaskExecutor<T>,
    {
        let spawner = TokioSpawner::current()?;
        self.build_with_spawner(spawner)
    }

    /// Build with a caller-supplied spawner.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if validation fails.
    pub fn build_with_spawner<T, S>(self, spawner: S) -> Result<TaskScheduler<T, E, S>, SchedulerError>
    where
        T: Clone + Send + Sync + 'static,
        E: TaskExecutor<T>,
        S: Spawn + Send + Sync + 'static,
    {
        self.config
            .validate()
            .map_err(SchedulerError::InvalidConfig)?;
        let events = self.sink.map_or_else(EventPublisher::disabled, EventPublisher::new);
        let queue = match self.seed {
            Some(seed) => AsyncQueue::with_seed(self.config, events.clone(), seed),
            None => AsyncQueue::new(self.config, events.clone()),
        };
        tracing::debug!(
            max_concurrent = queue.config().max_concurrent,
            max_queue_size = queue.config().max_queue_size,
            "scheduler built"
        );
        Ok(TaskScheduler::from_queue(queue, self.executor, spawner, events))
    }
}

/// Build a scheduler on the current runtime from a JSON configuration.
///
/// # Errors
///
/// [`SchedulerError::InvalidConfig`] if the JSON does not parse or validate,
/// or [`SchedulerError::Runtime`] outside a tokio runtime.
pub fn build_scheduler<T, E>(
    config_json: &str,
    executor: E,
) -> Result<TaskScheduler<T, E, TokioSpawner>, SchedulerError>
where
    T: Clone + Send + Sync + 'static,
    E: TaskExecutor<T>,
{
    let config = QueueConfig::from_json_str(config_json)
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;
    SchedulerBuilder::new(executor).config(config).build()
}
