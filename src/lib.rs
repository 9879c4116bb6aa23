//! # Asset Task Scheduler
//!
//! An asynchronous task scheduler for coordinating concurrent resource loads
//! (models, textures, floor plans, point clouds) behind a rendering engine.
//!
//! The scheduler knows nothing about what a task does. It takes a
//! caller-supplied [`TaskExecutor`](core::TaskExecutor), and for every
//! submitted [`TaskConfig`](core::TaskConfig) it handles queueing, priority,
//! concurrency limits, timeouts, retries and cancellation.
//!
//! ## Key Features
//!
//! - **Priority-weighted dispatch**: pending tasks are kept in stable
//!   priority order and selected by weighted random draw, so urgent loads
//!   dominate without starving background ones
//! - **Bounded concurrency and queue depth**: submissions beyond capacity are
//!   rejected with [`SchedulerError::QueueFull`](core::SchedulerError)
//! - **Timeouts and retries**: each attempt races a timer; failures are
//!   retried at their original priority until the budget is spent
//! - **Cooperative cancellation**: every attempt gets a
//!   `CancellationToken` that fires on timeout or explicit cancel
//! - **Idempotent submission**: resubmitting a live identifier returns the
//!   same task
//! - **Advisory events**: enqueue, dequeue, progress, completion, failure and
//!   retry notifications go to an injected [`EventSink`](core::EventSink)
//!
//! ## Example
//!
//! ```rust,ignore
//! use asset_task_scheduler::builders::SchedulerBuilder;
//! use asset_task_scheduler::config::QueueConfig;
//! use asset_task_scheduler::core::{AppResult, TaskConfig, TaskContext};
//! use asset_task_scheduler::util::Priority;
//!
//! let scheduler = SchedulerBuilder::new(|ctx: TaskContext| async move {
//!     AppResult::Ok(fetch_bytes(&ctx.target, ctx.cancellation()).await?)
//! })
//! .config(QueueConfig::new().with_max_concurrent(4))
//! .build()?;
//! scheduler.start();
//!
//! let handle = scheduler.schedule(
//!     TaskConfig::new("floor-3", "/floors/3.glb").with_priority(Priority::High),
//! )?;
//! let result = handle.wait().await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions.
pub mod core;
/// Configuration models for the queue and scheduler.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
