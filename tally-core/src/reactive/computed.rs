//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its derive function and caches the
//!    result. Nothing runs at construction.
//!
//! 2. When accessed again, if no dependency has changed, it returns the cached
//!    value without running the derive function.
//!
//! 3. When a dependency changes, the computed is marked dirty and passes the
//!    invalidation on to its own subscribers right away.
//!
//! 4. On next access, a dirty computed runs the derive function again.
//!
//! # Dependencies Are Rebuilt Every Run
//!
//! The dependency set is exactly the set of cells read during the most recent
//! run. Before each run the computed unsubscribes from everything it read last
//! time, then subscribes again to whatever the new run reads.
//!
//! A derive function that reads a cell only inside a branch will not depend
//! on that cell during runs where the branch is not taken:
//!
//! ```rust
//! use tally_core::reactive::{Computed, Signal};
//!
//! let enabled = Signal::new(false);
//! let counter = Signal::new(1);
//!
//! let (e, c) = (enabled.clone(), counter.clone());
//! let derived = Computed::new(move || if e.get() { c.get() * 10 } else { 0 });
//!
//! assert_eq!(derived.get(), 0);
//! // `counter` was never read, so the computed is not subscribed to it.
//! assert_eq!(counter.subscriber_count(), 0);
//! ```
//!
//! Read every cell you depend on unconditionally, before branching, to avoid
//! this.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::context::{release, Dependencies, ReactiveContext};
use super::readable::Readable;
use super::runtime::Reactive;
use super::subscriber::{Source, SourceId, Subscriber, SubscriberId, SubscriberSet};

/// Cache state of a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The derive function has never run.
    Uncomputed,

    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last run.
    Dirty,
}

struct ComputedInner<T> {
    source_id: SourceId,
    subscriber_id: SubscriberId,
    this: Weak<ComputedInner<T>>,
    derive: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: Mutex<ComputedState>,
    /// Bumped by every invalidation, including ones that arrive mid-run.
    version: AtomicU64,
    /// Cells read during the most recent run.
    dependencies: Mutex<Dependencies>,
    subscribers: SubscriberSet,
    runs: AtomicUsize,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn value_or_recompute(&self) -> T {
        if *self.state.lock() == ComputedState::Clean {
            if let Some(value) = self.value.read().as_ref() {
                return value.clone();
            }
        }
        self.recompute()
    }

    /// Run the derive function within a reactive context to collect
    /// dependencies, then cache the result.
    fn recompute(&self) -> T {
        debug_assert!(
            !ReactiveContext::is_evaluating(self.subscriber_id),
            "computed {:?} read itself while deriving",
            self.source_id
        );

        let previous = std::mem::take(&mut *self.dependencies.lock());
        release(&previous, self.subscriber_id);

        let version = self.version.load(Ordering::SeqCst);
        let subscriber: Weak<dyn Reactive> = self.this.clone();
        let (value, dependencies) = {
            let ctx = ReactiveContext::enter(self.subscriber_id, subscriber);
            let value = (self.derive)();
            (value, ctx.take_dependencies())
        };

        self.runs.fetch_add(1, Ordering::Relaxed);
        trace!(
            computed = ?self.source_id,
            dependencies = dependencies.len(),
            "computed recomputed"
        );

        *self.dependencies.lock() = dependencies;
        *self.value.write() = Some(value.clone());

        // A dependency written while `derive` ran (from another thread, or by
        // `derive` itself) makes this value stale already.
        let stale = {
            let mut state = self.state.lock();
            let stale = self.version.load(Ordering::SeqCst) != version;
            *state = if stale {
                ComputedState::Dirty
            } else {
                ComputedState::Clean
            };
            stale
        };
        if stale {
            trace!(computed = ?self.source_id, "computed invalidated while deriving");
            self.subscribers.notify();
        }

        value
    }
}

impl<T> Source for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }
}

impl<T> Reactive for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn invalidate(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            // A dirty computed has already told its subscribers.
            if *state != ComputedState::Clean {
                return;
            }
            *state = ComputedState::Dirty;
        }

        trace!(computed = ?self.source_id, "computed invalidated");
        self.subscribers.notify();
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// A computed has no `set` or `update`; its value only ever comes from the
/// derive function. Cloning yields another handle to the same cell.
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new computed with the given derive function.
    ///
    /// The function is not run immediately. It runs on first access.
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new_cyclic(|this| ComputedInner {
                source_id: SourceId::new(),
                subscriber_id: SubscriberId::new(),
                this: this.clone(),
                derive: Box::new(derive),
                value: RwLock::new(None),
                state: Mutex::new(ComputedState::Uncomputed),
                version: AtomicU64::new(0),
                dependencies: Mutex::new(Dependencies::new()),
                subscribers: SubscriberSet::new(),
                runs: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the computed's unique ID as a readable cell.
    pub fn id(&self) -> SourceId {
        self.inner.source_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If called within a reactive context, this also registers the current
    /// computation as a subscriber.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.inner);
        self.inner.value_or_recompute()
    }

    /// Get the current value without tracking it as a dependency.
    ///
    /// Still recomputes if the cache is stale.
    pub fn get_untracked(&self) -> T {
        self.inner.value_or_recompute()
    }

    /// Get the current cache state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.lock()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of times the derive function has run.
    pub fn compute_count(&self) -> usize {
        self.inner.runs.load(Ordering::Relaxed)
    }

    /// Number of cells read during the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Register a raw subscriber, notified synchronously when this computed
    /// is invalidated.
    ///
    /// The value is computed first if needed, so the computed is subscribed
    /// to its own dependencies before the subscriber starts listening.
    pub fn subscribe(&self, subscriber: &Subscriber) {
        self.inner.value_or_recompute();
        subscriber.attach(&self.inner.subscribers);
    }

    /// Remove a raw subscriber.
    pub fn unsubscribe(&self, subscriber: &Subscriber) {
        self.inner.subscribers.remove(subscriber.id());
    }
}

impl<T> Readable<T> for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn get_untracked(&self) -> T {
        Computed::get_untracked(self)
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.source_id)
            .field("state", &self.state())
            .field("value", &*self.inner.value.read())
            .field("dependency_count", &self.dependency_count())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
