//! Tests for builder modules

use asset_task_scheduler::builders::{build_scheduler, SchedulerBuilder};
use asset_task_scheduler::config::QueueConfig;
use asset_task_scheduler::core::{AppResult, SchedulerError, TaskContext, TaskScheduler};
use asset_task_scheduler::runtime::TokioSpawner;

async fn echo(ctx: TaskContext) -> AppResult<String> {
    Ok(ctx.target)
}

#[tokio::test]
async fn test_builder_defaults() {
    let scheduler: TaskScheduler<String, _, _> = SchedulerBuilder::new(echo).build().unwrap();
    let status = scheduler.get_status();
    assert_eq!(status.max_concurrent, 3);
    assert_eq!(status.max_queue_size, 100);
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result: Result<TaskScheduler<String, _, _>, _> = SchedulerBuilder::new(echo)
        .config(QueueConfig::new().with_max_concurrent(0))
        .build();
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_builder_outside_runtime_fails() {
    let result: Result<TaskScheduler<String, _, _>, _> = SchedulerBuilder::new(echo).build();
    assert!(matches!(result, Err(SchedulerError::Runtime(_))));
}

#[test]
fn test_builder_with_explicit_spawner() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let scheduler: TaskScheduler<String, _, _> = SchedulerBuilder::new(echo)
        .config(QueueConfig::new().with_max_concurrent(5))
        .seed(9)
        .build_with_spawner(TokioSpawner::new(runtime.handle().clone()))
        .unwrap();
    assert_eq!(scheduler.get_status().max_concurrent, 5);
}

#[tokio::test]
async fn test_build_scheduler_from_json() {
    let scheduler: TaskScheduler<String, _, _> =
        build_scheduler(r#"{"max_concurrent": 2, "max_queue_size": 10}"#, echo).unwrap();
    assert_eq!(scheduler.get_status().max_concurrent, 2);
    assert_eq!(scheduler.get_status().max_queue_size, 10);
}

#[tokio::test]
async fn test_build_scheduler_rejects_bad_json() {
    let result: Result<TaskScheduler<String, _, _>, _> = build_scheduler("{", echo);
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}
