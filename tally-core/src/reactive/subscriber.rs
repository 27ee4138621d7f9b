//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: computeds,
//! effects, and raw host callbacks. A source is any readable cell that a
//! subscriber can depend on: signals and computeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::runtime::Reactive;

/// Unique identifier for a subscriber.
///
/// Each subscriber (computed, effect, or host callback) gets a unique ID when
/// created. This ID is used to track dependencies and avoid duplicate
/// subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a readable cell (signal or computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A readable reactive cell that computations can depend on.
pub(crate) trait Source: Send + Sync {
    fn source_id(&self) -> SourceId;

    fn subscribers(&self) -> &SubscriberSet;
}

/// The computations currently subscribed to a source.
///
/// Only weak references are held: a source never keeps its dependents alive.
/// Insertion order is preserved so notification order is deterministic.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    entries: Mutex<IndexMap<SubscriberId, Weak<dyn Reactive>>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, id: SubscriberId, subscriber: Weak<dyn Reactive>) {
        self.entries.lock().insert(id, subscriber);
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.entries.lock().shift_remove(&id).is_some()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Invalidate every live subscriber.
    ///
    /// The set is snapshotted first so subscribers may (un)subscribe while
    /// being notified. Entries whose subscriber has been dropped are pruned.
    pub(crate) fn notify(&self) {
        let snapshot: SmallVec<[Weak<dyn Reactive>; 4]> = {
            let mut entries = self.entries.lock();
            entries.retain(|_, subscriber| subscriber.strong_count() > 0);
            entries.values().cloned().collect()
        };

        for subscriber in snapshot {
            if let Some(subscriber) = subscriber.upgrade() {
                subscriber.invalidate();
            }
        }
    }
}

/// A raw subscriber to reactive values.
///
/// This is the hook a host framework uses to learn that a cell changed, for
/// example to schedule a re-render. The callback is invoked synchronously,
/// once per change notification, and is never batched.
///
/// Dropping every clone of the subscriber ends all of its subscriptions.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

struct SubscriberInner {
    id: SubscriberId,
    /// The callback to invoke when a subscribed cell changes.
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Reactive for SubscriberInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn invalidate(&self) {
        (self.notify)();
    }
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SubscriberInner {
                id: SubscriberId::new(),
                notify: Box::new(notify),
            }),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Invoke the callback directly.
    pub fn notify(&self) {
        (self.inner.notify)();
    }

    pub(crate) fn attach(&self, set: &SubscriberSet) {
        let inner: Arc<dyn Reactive> = self.inner.clone();
        set.insert(self.inner.id, Arc::downgrade(&inner));
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.inner.id).finish()
    }
}
