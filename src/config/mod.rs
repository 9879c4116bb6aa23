//! Configuration models for the queue and scheduler.

pub mod queue;

pub use queue::{PriorityWeights, QueueConfig, ENV_PREFIX};
