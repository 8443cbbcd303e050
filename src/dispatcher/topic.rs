//! Topic management
//!
//! A `Topic` holds the ordered subscriber list for one topic name. Unlike a
//! set, the list keeps insertion order (fan-out order) and allows the same
//! callback to be registered more than once; every registration gets its own
//! [`SubscriptionId`].
//!
//! Concurrency note: callers must synchronize access to `Topic` (the
//! dispatcher keeps every topic behind its registry lock).

use std::collections::HashMap;
use std::sync::Arc;

use super::subscription::SubscriptionId;

/// A shared subscriber callback.
///
/// Subscribing a `Handler` (rather than a bare closure) lets the caller keep a
/// clone and later remove the subscription with
/// [`Dispatcher::unsubscribe`](super::Dispatcher::unsubscribe).
pub type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

pub(crate) type FallibleHandler<P> = Arc<dyn Fn(&P) -> Result<(), String> + Send + Sync>;

pub(crate) enum Callback<P> {
    Plain(Handler<P>),
    Fallible(FallibleHandler<P>),
}

impl<P> Callback<P> {
    pub(crate) fn invoke(&self, payload: &P) -> Result<(), String> {
        match self {
            Callback::Plain(handler) => {
                handler(payload);
                Ok(())
            }
            Callback::Fallible(handler) => handler(payload),
        }
    }

    fn is_handler(&self, handler: &Handler<P>) -> bool {
        match self {
            // compare data pointers only, vtable pointers are not unique
            Callback::Plain(own) => {
                Arc::as_ptr(own) as *const () == Arc::as_ptr(handler) as *const ()
            }
            Callback::Fallible(_) => false,
        }
    }
}

impl<P> Clone for Callback<P> {
    fn clone(&self) -> Self {
        match self {
            Callback::Plain(h) => Callback::Plain(Arc::clone(h)),
            Callback::Fallible(h) => Callback::Fallible(Arc::clone(h)),
        }
    }
}

pub(crate) struct Entry<P> {
    pub(crate) id: SubscriptionId,
    pub(crate) callback: Callback<P>,
    /// Removed from the topic when the first delivery snapshot is taken.
    pub(crate) once: bool,
}

/// One handler captured by a publish snapshot.
pub(crate) struct Delivery<P> {
    pub(crate) id: SubscriptionId,
    pub(crate) callback: Callback<P>,
}

pub(crate) struct Topic<P> {
    pub(crate) name: String,
    pub(crate) entries: Vec<Entry<P>>,
}

impl<P> Topic<P> {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, entry: Entry<P>) {
        self.entries.push(entry);
    }

    /// Removes the subscription with the given id. Unknown ids are ignored.
    ///
    /// The removed entry is handed back so the caller can drop it after
    /// releasing the registry lock: dropping a handler may run arbitrary
    /// destructors, including ones that call back into the dispatcher.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Entry<P>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        // `remove`, not `swap_remove`: fan-out order must survive
        Some(self.entries.remove(pos))
    }

    /// Removes the earliest registration of `handler`.
    pub(crate) fn unsubscribe_handler(&mut self, handler: &Handler<P>) -> Option<Entry<P>> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.callback.is_handler(handler))?;
        Some(self.entries.remove(pos))
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies the current subscriber list in subscription order.
    ///
    /// One-shot entries are taken out of the topic here, so a reentrant
    /// publish can never deliver to them a second time.
    pub(crate) fn snapshot(&mut self) -> Vec<Delivery<P>> {
        let deliveries = self
            .entries
            .iter()
            .map(|e| Delivery {
                id: e.id,
                callback: e.callback.clone(),
            })
            .collect();
        // dropped one-shot entries only release a reference, the delivery
        // above still owns the callback
        self.entries.retain(|e| !e.once);
        deliveries
    }
}

/// Topic name to subscriber list. Topics without subscribers are not kept.
pub(crate) struct Registry<P> {
    topics: HashMap<String, Topic<P>>,
}

impl<P> Registry<P> {
    pub(crate) fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    /// Appends an entry, creating the topic if it doesn't exist.
    pub(crate) fn subscribe(&mut self, topic: &str, entry: Entry<P>) {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(entry);
    }

    pub(crate) fn unsubscribe(&mut self, topic: &str, id: SubscriptionId) -> Option<Entry<P>> {
        let removed = self.topics.get_mut(topic)?.unsubscribe(id);
        self.prune(topic);
        removed
    }

    pub(crate) fn unsubscribe_handler(
        &mut self,
        topic: &str,
        handler: &Handler<P>,
    ) -> Option<Entry<P>> {
        let removed = self.topics.get_mut(topic)?.unsubscribe_handler(handler);
        self.prune(topic);
        removed
    }

    pub(crate) fn contains(&self, topic: &str, id: SubscriptionId) -> bool {
        self.topics.get(topic).is_some_and(|t| t.contains(id))
    }

    pub(crate) fn snapshot(&mut self, topic: &str) -> Vec<Delivery<P>> {
        let Some(t) = self.topics.get_mut(topic) else {
            return Vec::new();
        };
        let deliveries = t.snapshot();
        self.prune(topic);
        deliveries
    }

    pub(crate) fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Topic::len)
    }

    /// Names of topics with at least one subscriber, sorted.
    pub(crate) fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Takes every entry of `topic` out of the registry.
    pub(crate) fn remove_topic(&mut self, topic: &str) -> Vec<Entry<P>> {
        self.topics.remove(topic).map_or_else(Vec::new, |t| t.entries)
    }

    /// Takes every entry of every topic out of the registry.
    pub(crate) fn clear(&mut self) -> Vec<Entry<P>> {
        self.topics
            .drain()
            .flat_map(|(_, t)| t.entries)
            .collect()
    }

    fn prune(&mut self, topic: &str) {
        if self.topics.get(topic).is_some_and(Topic::is_empty) {
            self.topics.remove(topic);
        }
    }
}
