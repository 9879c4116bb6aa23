//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use asset_task_scheduler::config::{PriorityWeights, QueueConfig};
use asset_task_scheduler::util::Priority;

#[test]
fn test_queue_config_defaults_validate() {
    let config = QueueConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_concurrent, 3);
    assert_eq!(config.max_queue_size, 100);
    assert_eq!(config.default_timeout(), Duration::from_secs(30));
    assert_eq!(config.default_max_retries, 3);
    assert_eq!(config.poll_interval(), Duration::from_millis(100));
}

#[test]
fn test_queue_config_invalid_max_concurrent() {
    let invalid = QueueConfig::new().with_max_concurrent(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_queue_config_invalid_queue_size() {
    let invalid = QueueConfig::new().with_max_queue_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_queue_config_invalid_timeout() {
    let invalid = QueueConfig::new().with_default_timeout(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_queue_config_invalid_poll_interval() {
    let invalid = QueueConfig::new().with_poll_interval(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_single_nonzero_weight_is_valid() {
    let weights = PriorityWeights {
        low: 0,
        normal: 0,
        high: 0,
        urgent: 1,
    };
    let config = QueueConfig::new().with_priority_weights(weights);
    assert!(config.validate().is_ok());
    assert_eq!(config.priority_weights.weight(Priority::Urgent), 1);
}

#[test]
fn test_queue_config_from_json_partial() {
    let json = r#"{
        "max_concurrent": 6,
        "priority_weights": { "urgent": 16 }
    }"#;
    let config = QueueConfig::from_json_str(json).unwrap();
    assert_eq!(config.max_concurrent, 6);
    assert_eq!(config.max_queue_size, 100);
    assert_eq!(config.priority_weights.urgent, 16);
    assert_eq!(config.priority_weights.low, 1);
}

#[test]
fn test_queue_config_from_json_rejects_invalid() {
    assert!(QueueConfig::from_json_str(r#"{"max_queue_size": 0}"#).is_err());
    assert!(QueueConfig::from_json_str("not json").is_err());
}

#[test]
fn test_queue_config_from_lookup() {
    let vars: HashMap<&str, &str> = [
        ("MAX_CONCURRENT", "8"),
        ("DEFAULT_TIMEOUT_MS", " 2500 "),
        ("WEIGHT_LOW", "0"),
    ]
    .into_iter()
    .collect();
    let config = QueueConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
    assert_eq!(config.max_concurrent, 8);
    assert_eq!(config.default_timeout_ms, 2500);
    assert_eq!(config.priority_weights.low, 0);
    assert_eq!(config.priority_weights.normal, 2);
}

#[test]
fn test_queue_config_from_lookup_reports_key() {
    let err = QueueConfig::from_lookup(|key| (key == "MAX_QUEUE_SIZE").then(|| "lots".to_string()))
        .unwrap_err();
    assert!(err.contains("ASSET_SCHEDULER_MAX_QUEUE_SIZE"), "{err}");
}

#[test]
fn test_queue_config_from_env() {
    let keys = [
        "ASSET_SCHEDULER_MAX_CONCURRENT",
        "ASSET_SCHEDULER_POLL_INTERVAL_MS",
        "ASSET_SCHEDULER_WEIGHT_URGENT",
    ];
    std::env::set_var(keys[0], "7");
    std::env::set_var(keys[1], "25");
    std::env::set_var(keys[2], "12");

    let config = QueueConfig::from_env();
    for key in keys {
        std::env::remove_var(key);
    }

    let config = config.unwrap();
    assert_eq!(config.max_concurrent, 7);
    assert_eq!(config.poll_interval(), Duration::from_millis(25));
    assert_eq!(config.priority_weights.urgent, 12);
    assert_eq!(config.max_queue_size, 100);
}
