//! Subscription handles (disposers).
//!
//! [`Subscription`] is returned by every `subscribe*` call. It refers back to
//! the dispatcher through a `Weak` pointer, so holding one never keeps the
//! dispatcher alive, and disposing after the dispatcher is gone is a no-op.
//!
//! Dropping a `Subscription` does **not** unsubscribe; call
//! [`Subscription::dispose`] or convert it with [`Subscription::into_guard`]
//! for drop-to-unsubscribe behavior.

use std::fmt;
use std::sync::Weak;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one registration of a handler under one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registry-side half of a subscription, erased over the payload type.
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, topic: &str, id: SubscriptionId) -> bool;
    fn is_attached(&self, topic: &str, id: SubscriptionId) -> bool;
}

/// Disposer for a single subscription.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, topic: &str, registry: Weak<dyn Detach>) -> Self {
        Self {
            id,
            topic: topic.to_string(),
            registry,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Removes exactly this subscription.
    ///
    /// Safe to call any number of times; returns `true` only for the call that
    /// actually removed it.
    pub fn dispose(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.detach(&self.topic, self.id),
            None => false,
        }
    }

    /// `true` while the subscription is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.is_attached(&self.topic, self.id))
    }

    /// Wraps the subscription so it is disposed when the guard is dropped.
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: self,
            armed: true,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

/// RAII wrapper ensuring the subscription is removed when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Subscription,
    armed: bool,
}

impl SubscriptionGuard {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Gives the subscription back without disposing it.
    pub fn disarm(mut self) -> Subscription {
        self.armed = false;
        self.subscription.clone()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.subscription.dispose();
        }
    }
}
