//! Core scheduling abstractions: tasks, the queue, the runner and the
//! scheduler that ties them together.

pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod task;

pub use error::{AppResult, SchedulerError};
pub use events::{
    EventPublisher, EventSink, InMemoryEventSink, ProgressReporter, ProgressUpdate,
    SchedulerEvent, TracingEventSink,
};
pub use executor::{Spawn, TaskContext, TaskExecutor};
pub use queue::{AsyncQueue, QueueStatus};
pub use runner::TaskRunner;
pub use scheduler::TaskScheduler;
pub use task::{
    CompletionCallback, ErrorCallback, ProgressCallback, ResolvedTaskConfig, Task, TaskCallbacks,
    TaskConfig, TaskHandle, TaskOutcome, TaskResult, TaskSnapshot, TaskStatus,
};
