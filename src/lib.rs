//! # topicbus
//!
//! `topicbus` is a minimalist, in-process publish/subscribe dispatcher.
//! Producers publish a payload to a named topic and every subscriber of that
//! topic is called synchronously, in the order it subscribed. Producers and
//! consumers never hold references to one another.
//!
//! ## Core Modules
//!
//! - `dispatcher`: the topic registry, subscribe/unsubscribe/publish and the
//!   disposer handles returned by subscribe.
//! - `failure`: reporting of subscribers that panic or fail during a publish.
//! - `config`: loading settings from files and environment variables.
//! - `utils`: shared utilities, such as error handling and logging setup.
//!
//! ## Guarantees
//!
//! - Fan-out order is subscription order.
//! - A publish delivers to a snapshot of the subscribers taken when it
//!   starts; subscribing or unsubscribing from inside a handler only affects
//!   later publishes.
//! - A failing subscriber never stops delivery to the others and never
//!   surfaces as an error to the publisher.
//! - Disposing a subscription is idempotent.

pub mod config;
pub mod dispatcher;
pub mod failure;
pub mod utils;

pub use dispatcher::{
    Dispatcher, Handler, PublishReport, Subscription, SubscriptionGuard, SubscriptionId,
};
pub use failure::{FailureCollector, FailureKind, FailureSink, HandlerFailure, LogFailures};
pub use utils::TopicbusError;
