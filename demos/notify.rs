//! Notification example
//!
//! Wires a dispatcher from configuration, subscribes a toast renderer and an
//! audit log to `NOTIFY`, and shows that a failing subscriber does not stop
//! the others.
//!
//! Run with: cargo run --example notify

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use topicbus::config::load_config;
use topicbus::utils::logging;
use topicbus::{Dispatcher, TopicbusError};
use tracing::info;

fn main() -> Result<(), TopicbusError> {
    let mut settings = load_config()?;
    settings.dispatcher.collect_failures = true;
    logging::init(&settings.logging.level);

    let bus: Dispatcher<Value> = Dispatcher::from_settings(&settings.dispatcher);

    let toast = bus.subscribe("NOTIFY", |event: &Value| {
        info!("toast: {} - {}", event["type"], event["message"]);
    });

    let audit = Arc::new(Mutex::new(Vec::new()));
    let audit_log = Arc::clone(&audit);
    let _audit = bus
        .subscribe("NOTIFY", move |event: &Value| {
            if let Ok(mut log) = audit_log.lock() {
                log.push(event.to_string());
            }
        })
        .into_guard();

    bus.subscribe_fallible("NOTIFY", |event: &Value| match event["type"].as_str() {
        Some("success" | "error") => Ok(()),
        other => Err(format!("unsupported notification type {other:?}")),
    });

    bus.publish("NOTIFY", json!({ "type": "success", "message": "Saved" }));
    bus.publish("NOTIFY", json!({ "type": "warning", "message": "Disk almost full" }));

    toast.dispose();
    let report = bus.publish("NOTIFY", json!({ "type": "error", "message": "Offline" }));
    info!(
        delivered = report.delivered,
        failed = report.failed,
        "published after toast was disposed"
    );

    // nobody listens here
    bus.publish("UNUSED", Value::Null);

    if let Some(collector) = bus.failure_collector() {
        for failure in collector.failures() {
            info!("collected failure: {failure}");
        }
    }
    if let Ok(log) = audit.lock() {
        info!(entries = log.len(), "audit log");
    }
    Ok(())
}
