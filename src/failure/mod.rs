//! Handler failure reporting
//!
//! `publish` never returns an error to the publisher. When a subscriber panics
//! or a fallible subscriber returns `Err`, the dispatcher builds a
//! [`HandlerFailure`] and hands it to every configured [`FailureSink`], then
//! moves on to the next subscriber.
//!
//! Built-in sinks:
//! - [`LogFailures`]: emits a `tracing` warning per failure (the default).
//! - [`FailureCollector`]: keeps the most recent failures in memory.
//! - any `Fn(&HandlerFailure) + Send + Sync` closure.

mod collector;
mod sink;

pub use collector::FailureCollector;
pub use sink::{FailureSink, LogFailures};

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::dispatcher::SubscriptionId;

/// How a subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The handler panicked; the panic was caught at the dispatcher boundary.
    Panicked,
    /// A fallible handler returned `Err`.
    Errored,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Panicked => f.write_str("panicked"),
            FailureKind::Errored => f.write_str("returned an error"),
        }
    }
}

/// A single subscriber failure observed during one publish call.
#[derive(Debug, Clone, Serialize, Error)]
#[error("subscriber {subscription} on topic '{topic}' {kind}: {message}")]
pub struct HandlerFailure {
    pub topic: String,
    pub subscription: SubscriptionId,
    pub kind: FailureKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl HandlerFailure {
    pub(crate) fn errored(topic: &str, subscription: SubscriptionId, message: String) -> Self {
        Self {
            topic: topic.to_string(),
            subscription,
            kind: FailureKind::Errored,
            message,
            occurred_at: Utc::now(),
        }
    }

    pub(crate) fn panicked(
        topic: &str,
        subscription: SubscriptionId,
        panic: &(dyn Any + Send),
    ) -> Self {
        Self {
            topic: topic.to_string(),
            subscription,
            kind: FailureKind::Panicked,
            message: panic_message(panic),
            occurred_at: Utc::now(),
        }
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;
