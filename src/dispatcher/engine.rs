//! Dispatcher engine
//!
//! This module contains the in-process dispatcher responsible for:
//! - managing topics and their ordered subscriber lists
//! - fanning a published payload out to every subscriber of a topic
//! - containing subscriber failures so one bad handler cannot stop delivery
//!   to the others
//!
//! Concurrency and usage notes:
//! - Everything is synchronous. `publish` runs all handlers in-line and
//!   returns once the last one finished.
//! - The registry sits behind one mutex. `publish` only holds it long enough
//!   to copy the subscriber list; handlers run with the lock released, so a
//!   handler may subscribe, unsubscribe or publish on the same dispatcher.
//! - Changes made while a publish is running (including from inside a
//!   handler) only affect later publishes.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, trace};

use super::subscription::{Detach, Subscription, SubscriptionId};
use super::topic::{Callback, Entry, FallibleHandler, Handler, Registry};
use crate::config::DispatcherSettings;
use crate::failure::{FailureCollector, FailureSink, HandlerFailure, LogFailures};

/// Outcome counts of a single publish call.
///
/// Purely informational: a publisher never has to look at it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that returned normally.
    pub delivered: usize,
    /// Handlers that panicked or returned `Err`.
    pub failed: usize,
}

impl PublishReport {
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

struct Inner<P> {
    registry: Mutex<Registry<P>>,
    sinks: Vec<Arc<dyn FailureSink>>,
    collector: Option<Arc<FailureCollector>>,
}

impl<P> Inner<P> {
    // Registry mutations are single calls on the map, so a poisoned lock
    // never guards a half-applied change.
    fn registry(&self) -> MutexGuard<'_, Registry<P>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, failure: &HandlerFailure) {
        for sink in &self.sinks {
            if panic::catch_unwind(AssertUnwindSafe(|| sink.on_failure(failure))).is_err() {
                error!(
                    topic = %failure.topic,
                    subscription = %failure.subscription,
                    "failure sink panicked while reporting a subscriber failure"
                );
            }
        }
    }
}

impl<P> Detach for Inner<P> {
    fn detach(&self, topic: &str, id: SubscriptionId) -> bool {
        // the guard is released at the end of this statement; `removed` is
        // dropped after it, so handler destructors may reenter the dispatcher
        let removed = self.registry().unsubscribe(topic, id);
        match removed {
            Some(_) => {
                debug!(topic, subscription = %id, "unsubscribed");
                true
            }
            None => false,
        }
    }

    fn is_attached(&self, topic: &str, id: SubscriptionId) -> bool {
        self.registry().contains(topic, id)
    }
}

/// In-process publish/subscribe dispatcher for payloads of type `P`.
///
/// Cloning a `Dispatcher` yields another handle to the same registry;
/// `Dispatcher::new` always starts an independent one.
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use topicbus::Dispatcher;
///
/// let bus: Dispatcher<String> = Dispatcher::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let subscription = bus.subscribe("NOTIFY", move |msg: &String| {
///     sink.lock().unwrap().push(msg.clone());
/// });
///
/// bus.publish("NOTIFY", "saved".to_string());
/// subscription.dispose();
/// bus.publish("NOTIFY", "ignored".to_string());
///
/// assert_eq!(*seen.lock().unwrap(), vec!["saved".to_string()]);
/// ```
pub struct Dispatcher<P: 'static> {
    inner: Arc<Inner<P>>,
}

impl<P: 'static> Dispatcher<P> {
    /// Creates a dispatcher that logs subscriber failures through `tracing`.
    pub fn new() -> Self {
        Self::build(vec![Arc::new(LogFailures)], None)
    }

    /// Creates a dispatcher reporting subscriber failures to `sink` only.
    pub fn with_failure_sink(sink: Arc<dyn FailureSink>) -> Self {
        Self::build(vec![sink], None)
    }

    /// Creates a dispatcher wired according to `settings`.
    ///
    /// With `collect_failures` enabled the collector is reachable through
    /// [`Dispatcher::failure_collector`].
    pub fn from_settings(settings: &DispatcherSettings) -> Self {
        let mut sinks: Vec<Arc<dyn FailureSink>> = Vec::new();
        if settings.log_failures {
            sinks.push(Arc::new(LogFailures));
        }
        let collector = settings
            .collect_failures
            .then(|| Arc::new(FailureCollector::new(settings.failure_history)));
        if let Some(collector) = &collector {
            sinks.push(Arc::clone(collector) as Arc<dyn FailureSink>);
        }
        Self::build(sinks, collector)
    }

    fn build(sinks: Vec<Arc<dyn FailureSink>>, collector: Option<Arc<FailureCollector>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::new()),
                sinks,
                collector,
            }),
        }
    }

    pub fn failure_collector(&self) -> Option<Arc<FailureCollector>> {
        self.inner.collector.clone()
    }

    /// Subscribes `handler` to `topic`, creating the topic if needed.
    ///
    /// Never fails. The same closure logic may be subscribed any number of
    /// times; each call gets its own [`Subscription`].
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe_handler(topic, Arc::new(handler))
    }

    /// Subscribes a shared [`Handler`]. Keep a clone of it to remove the
    /// subscription later with [`Dispatcher::unsubscribe`].
    pub fn subscribe_handler(&self, topic: &str, handler: Handler<P>) -> Subscription {
        self.attach(topic, Callback::Plain(handler), false)
    }

    /// Subscribes a handler that may fail. An `Err` is reported to the failure
    /// sinks exactly like a panic, and delivery continues.
    pub fn subscribe_fallible<F, E>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&P) -> Result<(), E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let callback: FallibleHandler<P> =
            Arc::new(move |payload: &P| handler(payload).map_err(|e| e.to_string()));
        self.attach(topic, Callback::Fallible(callback), false)
    }

    /// Subscribes a handler for the next publish on `topic` only.
    pub fn subscribe_once<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: FnOnce(&P) + Send + 'static,
    {
        let slot = Mutex::new(Some(handler));
        let callback: Handler<P> = Arc::new(move |payload: &P| {
            let handler = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(handler) = handler {
                handler(payload);
            }
        });
        self.attach(topic, Callback::Plain(callback), true)
    }

    fn attach(&self, topic: &str, callback: Callback<P>, once: bool) -> Subscription {
        let id = SubscriptionId::new();
        self.inner
            .registry()
            .subscribe(topic, Entry { id, callback, once });
        debug!(topic, subscription = %id, once, "subscribed");

        let weak: Weak<Inner<P>> = Arc::downgrade(&self.inner);
        let registry: Weak<dyn Detach> = weak;
        Subscription::new(id, topic, registry)
    }

    /// Removes the earliest still-registered subscription of `handler` under
    /// `topic`. Returns `false` (and does nothing) if there is none.
    pub fn unsubscribe(&self, topic: &str, handler: &Handler<P>) -> bool {
        let removed = self.inner.registry().unsubscribe_handler(topic, handler);
        match removed {
            Some(entry) => {
                debug!(topic, subscription = %entry.id, "unsubscribed by handler");
                true
            }
            None => false,
        }
    }

    /// Removes the subscription with the given id. Same as disposing it.
    pub fn unsubscribe_id(&self, topic: &str, id: SubscriptionId) -> bool {
        self.inner.detach(topic, id)
    }

    /// Publishes `payload` to every current subscriber of `topic`.
    pub fn publish(&self, topic: &str, payload: P) -> PublishReport {
        self.publish_ref(topic, &payload)
    }

    /// Publishes a borrowed payload.
    ///
    /// Handlers run in subscription order over a snapshot of the subscriber
    /// list taken on entry. A handler that panics or fails is reported to the
    /// failure sinks and the remaining handlers still run. Publishing to a
    /// topic nobody listens to does nothing.
    pub fn publish_ref(&self, topic: &str, payload: &P) -> PublishReport {
        let deliveries = self.inner.registry().snapshot(topic);
        let mut report = PublishReport::default();
        if deliveries.is_empty() {
            trace!(topic, "no subscribers, nothing to deliver");
            return report;
        }
        trace!(topic, subscribers = deliveries.len(), "publishing");

        for delivery in deliveries {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| delivery.callback.invoke(payload)));
            let failure = match outcome {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(message)) => HandlerFailure::errored(topic, delivery.id, message),
                Err(cause) => HandlerFailure::panicked(topic, delivery.id, cause.as_ref()),
            };
            report.failed += 1;
            self.inner.report(&failure);
        }
        report
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.registry().subscriber_count(topic)
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscriber_count(topic) > 0
    }

    /// Sorted names of all topics with at least one subscriber.
    pub fn topics(&self) -> Vec<String> {
        self.inner.registry().topic_names()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry().is_empty()
    }

    /// Drops every subscription of `topic` and returns how many there were.
    /// Their disposers become no-ops.
    pub fn clear_topic(&self, topic: &str) -> usize {
        let removed = self.inner.registry().remove_topic(topic);
        debug!(topic, removed = removed.len(), "cleared topic");
        removed.len()
    }

    /// Drops every subscription of every topic.
    pub fn clear(&self) -> usize {
        let removed = self.inner.registry().clear();
        debug!(removed = removed.len(), "cleared dispatcher");
        removed.len()
    }
}

impl<P: 'static> Default for Dispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> Clone for Dispatcher<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: 'static> fmt::Debug for Dispatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("topics", &self.topics())
            .field("sinks", &self.inner.sinks.len())
            .finish()
    }
}
