//! Tests for utility functions

use asset_task_scheduler::util::{now_ms, Priority, TaskId};

#[test]
fn test_priority_ordering() {
    assert!(Priority::Urgent > Priority::High);
    assert!(Priority::High > Priority::Normal);
    assert!(Priority::Normal > Priority::Low);
}

#[test]
fn test_priority_default_is_normal() {
    assert_eq!(Priority::default(), Priority::Normal);
}

#[test]
fn test_priority_labels() {
    let labels: Vec<_> = Priority::ALL.iter().map(|p| p.to_string()).collect();
    assert_eq!(labels, vec!["low", "normal", "high", "urgent"]);
}

#[test]
fn test_priority_serde_snake_case() {
    let json = serde_json::to_string(&Priority::Urgent).unwrap();
    assert_eq!(json, "\"urgent\"");
    let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
    assert_eq!(parsed, Priority::Low);
}

#[test]
fn test_task_id() {
    let id: TaskId = "floor-1".to_string();
    assert_eq!(id, "floor-1");
}

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 0);
}

#[test]
fn test_init_tracing_is_repeatable() {
    asset_task_scheduler::util::init_tracing();
    asset_task_scheduler::util::init_tracing_with("debug");
    tracing::info!("subscriber installed");
}
