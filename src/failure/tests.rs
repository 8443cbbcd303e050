use super::{FailureCollector, FailureKind, FailureSink, HandlerFailure, panic_message};
use crate::dispatcher::SubscriptionId;
use crate::utils::TopicbusError;

fn failure(message: &str) -> HandlerFailure {
    HandlerFailure::errored("NOTIFY", SubscriptionId::new(), message.to_string())
}

#[test]
fn test_panic_message_from_str_and_string() {
    let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
    assert_eq!(panic_message(payload.as_ref()), "boom");

    let payload: Box<dyn std::any::Any + Send> = Box::new(format!("boom {}", 2));
    assert_eq!(panic_message(payload.as_ref()), "boom 2");

    let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
    assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
}

#[test]
fn test_handler_failure_display() {
    let id = SubscriptionId::new();
    let payload: Box<dyn std::any::Any + Send> = Box::new("bad payload");
    let f = HandlerFailure::panicked("NOTIFY", id, payload.as_ref());
    assert_eq!(f.kind, FailureKind::Panicked);
    assert_eq!(
        f.to_string(),
        format!("subscriber {id} on topic 'NOTIFY' panicked: bad payload")
    );

    let err = TopicbusError::from(f);
    assert_eq!(err.as_label(), "handler");
}

#[test]
fn test_handler_failure_serializes() {
    let f = failure("nope");
    let json = serde_json::to_value(&f).unwrap();
    assert_eq!(json["topic"], "NOTIFY");
    assert_eq!(json["kind"], "errored");
    assert_eq!(json["message"], "nope");
}

#[test]
fn test_collector_keeps_most_recent() {
    let collector = FailureCollector::new(2);
    collector.on_failure(&failure("first"));
    collector.on_failure(&failure("second"));
    collector.on_failure(&failure("third"));

    let kept: Vec<String> = collector.failures().into_iter().map(|f| f.message).collect();
    assert_eq!(kept, vec!["second", "third"]);
    assert_eq!(collector.dropped(), 1);
    assert_eq!(collector.len(), 2);
}

#[test]
fn test_collector_take_drains() {
    let collector = FailureCollector::default();
    collector.on_failure(&failure("only"));
    assert_eq!(collector.take().len(), 1);
    assert!(collector.is_empty());
}

#[test]
fn test_collector_capacity_clamped() {
    let collector = FailureCollector::new(0);
    assert_eq!(collector.capacity(), 1);
}

#[test]
fn test_closure_is_a_sink() {
    let seen = std::sync::Mutex::new(Vec::new());
    let sink = |f: &HandlerFailure| seen.lock().unwrap().push(f.message.clone());
    sink.on_failure(&failure("via closure"));
    assert_eq!(*seen.lock().unwrap(), vec!["via closure".to_string()]);
}
