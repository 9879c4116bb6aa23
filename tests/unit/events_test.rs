//! Tests for advisory events and sinks

use asset_task_scheduler::core::{
    EventPublisher, EventSink, InMemoryEventSink, ProgressUpdate, SchedulerEvent,
    TracingEventSink,
};
use asset_task_scheduler::util::Priority;

fn enqueued(id: &str) -> SchedulerEvent {
    SchedulerEvent::Enqueued {
        task_id: id.to_string(),
        priority: Priority::Normal,
        pending: 1,
    }
}

#[test]
fn test_publisher_forwards_to_sink() {
    let sink = InMemoryEventSink::new(4);
    let publisher = EventPublisher::new(Box::new(sink.clone()));
    publisher.publish(enqueued("a"));
    publisher.clone().publish(enqueued("b"));
    assert_eq!(sink.events().len(), 2);
    assert_eq!(sink.events_for("b").len(), 1);
}

#[test]
fn test_disabled_publisher_drops_events() {
    let publisher = EventPublisher::disabled();
    publisher.publish(enqueued("a"));
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingEventSink;
    sink.record(SchedulerEvent::Progress(ProgressUpdate::new("a", 1, 2, "download")));
}

#[test]
fn test_event_names_and_ids() {
    let failed = SchedulerEvent::Failed {
        task_id: "mesh".to_string(),
        error: "task mesh failed: 500".to_string(),
        retry_count: 3,
    };
    assert_eq!(failed.name(), "failed");
    assert_eq!(failed.task_id(), "mesh");

    let progress = SchedulerEvent::Progress(ProgressUpdate::new("tex", 10, 40, "decode"));
    assert_eq!(progress.name(), "progress");
    assert_eq!(progress.task_id(), "tex");
}

#[test]
fn test_progress_percentage() {
    let update = ProgressUpdate::new("tex", 10, 40, "decode");
    assert!((update.percentage - 25.0).abs() < 1e-9);
    assert!(ProgressUpdate::new("tex", 10, 0, "decode").percentage.abs() < f64::EPSILON);
}

#[test]
fn test_event_json_round_trip() {
    let event = SchedulerEvent::Retry {
        task_id: "floor".to_string(),
        retry_count: 1,
        max_retries: 3,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains(r#""event":"retry""#));
    let back: SchedulerEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
