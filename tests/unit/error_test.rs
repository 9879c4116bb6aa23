//! Tests for error types

use asset_task_scheduler::core::SchedulerError;

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull(100);
    assert_eq!(format!("{}", err), "queue full: max queue depth 100 reached");
}

#[test]
fn test_timeout_error() {
    let err = SchedulerError::Timeout {
        task_id: "mesh".to_string(),
        timeout_ms: 30000,
    };
    assert_eq!(format!("{}", err), "task mesh timed out after 30000ms");
    assert!(err.is_timeout());
    assert!(err.is_retryable());
}

#[test]
fn test_cancelled_error() {
    let err = SchedulerError::Cancelled("tex".to_string());
    assert_eq!(format!("{}", err), "task tex was cancelled");
    assert!(!err.is_retryable());
}

#[test]
fn test_queue_cleared_error() {
    let err = SchedulerError::QueueCleared("tex".to_string());
    assert_eq!(format!("{}", err), "task tex rejected: queue cleared");
    assert!(!err.is_retryable());
}

#[test]
fn test_executor_error_from_anyhow() {
    let source = anyhow::anyhow!("404").context("fetching /models/a.glb");
    let err = SchedulerError::executor("a", &source);
    assert_eq!(
        format!("{}", err),
        "task a failed: fetching /models/a.glb: 404"
    );
    assert!(err.is_retryable());
    assert!(!err.is_timeout());
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_concurrent must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_concurrent must be greater than 0"
    );
}

#[test]
fn test_errors_are_cloneable_and_comparable() {
    let err = SchedulerError::Runtime("no reactor".to_string());
    assert_eq!(err.clone(), err);
}
