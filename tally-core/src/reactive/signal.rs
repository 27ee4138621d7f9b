//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (computed/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value is set, all subscribers are notified. There is no
//!    equality check: setting a value equal to the current one still notifies.
//!
//! 3. Notifications invalidate computeds and queue effects.
//!
//! # Composite Values
//!
//! Reads return a clone of the value. To change a struct or a collection held
//! in a signal, build the new value and `set` it (or use `update`). Mutating a
//! clone never reaches the signal and never notifies anyone.
//!
//! # Thread Safety
//!
//! The value is protected by a `parking_lot::RwLock`. No lock is held while
//! subscribers run or while an `update` closure runs.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::context::{untracked, ReactiveContext};
use super::readable::Readable;
use super::runtime::Runtime;
use super::subscriber::{Source, SourceId, Subscriber, SubscriberSet};

struct SignalInner<T> {
    id: SourceId,
    value: RwLock<T>,
    subscribers: SubscriberSet,
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use tally_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SourceId::new(),
                value: RwLock::new(value),
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.inner);
        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Replace the value and notify subscribers.
    ///
    /// Effects that depend on this signal run before `set` returns, unless a
    /// batch is open, in which case they run when the batch ends.
    pub fn set(&self, value: T) {
        trace!(
            signal = ?self.inner.id,
            subscribers = self.inner.subscribers.len(),
            "signal set"
        );

        Runtime::batch(|| {
            *self.inner.value.write() = value;
            self.inner.subscribers.notify();
        });
    }

    /// Replace the value with one computed from the current value.
    ///
    /// Equivalent to `set(f(&current))` performed as one operation. The read
    /// of the current value is not tracked.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get_untracked();
        let next = untracked(|| f(&current));
        self.set(next);
    }

    /// A read-only handle to this signal.
    ///
    /// The handle shares the cell: it observes every write made through this
    /// signal, but offers no way to write.
    pub fn as_readonly(&self) -> ReadonlySignal<T> {
        ReadonlySignal {
            signal: self.clone(),
        }
    }

    /// Register a raw subscriber, notified synchronously on every `set`.
    pub fn subscribe(&self, subscriber: &Subscriber) {
        subscriber.attach(&self.inner.subscribers);
    }

    /// Remove a raw subscriber.
    pub fn unsubscribe(&self, subscriber: &Subscriber) {
        self.inner.subscribers.remove(subscriber.id());
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A read-only view of a [`Signal`].
///
/// Obtained from [`Signal::as_readonly`]. It shares the underlying cell, so
/// reads always see the latest value and tracked reads subscribe to the cell
/// itself, but the type has no `set` or `update`.
pub struct ReadonlySignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> ReadonlySignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The ID of the underlying signal.
    pub fn id(&self) -> SourceId {
        self.signal.id()
    }

    /// Get the current value, tracking it as a dependency.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// Register a raw subscriber on the underlying signal.
    pub fn subscribe(&self, subscriber: &Subscriber) {
        self.signal.subscribe(subscriber);
    }

    /// Remove a raw subscriber from the underlying signal.
    pub fn unsubscribe(&self, subscriber: &Subscriber) {
        self.signal.unsubscribe(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T> Readable<T> for ReadonlySignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        self.signal.get()
    }

    fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T> Clone for ReadonlySignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> From<Signal<T>> for ReadonlySignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Self { signal }
    }
}

impl<T> Debug for ReadonlySignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadonlySignal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
