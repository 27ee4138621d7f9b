//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued. It re-runs once when
//!    the current batch ends, however many of its dependencies changed.
//!
//! 3. Before re-running, the effect calls the cleanup registered by the
//!    previous run, drops its old dependencies, and tracks new ones during
//!    execution.
//!
//! # Cleanup
//!
//! The effect function receives an [`OnCleanup`] registrar. A cleanup
//! registered there runs before the next run, or when the effect is disposed.
//! This is useful for releasing timers, connections, or listeners.
//!
//! # Disposal
//!
//! An effect lives until it is disposed, either explicitly through
//! [`Effect::dispose`] or by the [`Scope`](super::Scope) that owns it. Dropping
//! the handle does not stop it. Disposal runs the last cleanup, unsubscribes
//! from every dependency and removes the effect from the runtime, so later
//! changes can never reach it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::context::{release, Dependencies, ReactiveContext};
use super::runtime::{Reactive, Runtime};
use super::subscriber::SubscriberId;

type Cleanup = Box<dyn FnOnce() + Send>;
type RunFn = Box<dyn FnMut(&mut OnCleanup) + Send>;

/// Registrar handed to every effect run.
///
/// # Example
///
/// ```rust
/// use tally_core::reactive::{Effect, Signal};
///
/// let interval = Signal::new(1000);
/// let interval_clone = interval.clone();
///
/// let effect = Effect::new(move |on_cleanup| {
///     let period = interval_clone.get();
///     on_cleanup.register(move || println!("stopping timer ({period}ms)"));
/// });
///
/// interval.set(500); // prints "stopping timer (1000ms)" before re-running
/// effect.dispose();  // prints "stopping timer (500ms)"
/// ```
#[derive(Default)]
pub struct OnCleanup {
    cleanup: Option<Cleanup>,
}

impl OnCleanup {
    fn new() -> Self {
        Self::default()
    }

    /// Register the cleanup for this run, replacing any registered earlier in
    /// the same run.
    pub fn register<F>(&mut self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
    }

    fn take(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }
}

/// Options controlling an effect's lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectOptions {
    /// When set, an owning scope's teardown leaves the effect running. It must
    /// be disposed explicitly.
    pub manual_cleanup: bool,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt out of scope-driven disposal.
    pub fn manual_cleanup(mut self, manual_cleanup: bool) -> Self {
        self.manual_cleanup = manual_cleanup;
        self
    }
}

struct EffectInner {
    subscriber_id: SubscriberId,
    this: Weak<EffectInner>,
    options: EffectOptions,

    /// The effect function. Held for the whole run, so runs queued on
    /// different threads execute one after another.
    run: Mutex<RunFn>,

    /// Cells read during the most recent run.
    dependencies: Mutex<Dependencies>,

    /// Cleanup registered by the most recent run.
    cleanup: Mutex<Option<Cleanup>>,

    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    /// Execute the effect function within a reactive context to track
    /// dependencies.
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let mut run = self.run.lock();
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let previous_cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = previous_cleanup {
            cleanup();
        }

        let previous = std::mem::take(&mut *self.dependencies.lock());
        release(&previous, self.subscriber_id);

        let mut on_cleanup = OnCleanup::new();
        let subscriber: Weak<dyn Reactive> = self.this.clone();
        let dependencies = {
            let ctx = ReactiveContext::enter(self.subscriber_id, subscriber);
            (*run)(&mut on_cleanup);
            ctx.take_dependencies()
        };

        let runs = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(
            effect = ?self.subscriber_id,
            runs,
            dependencies = dependencies.len(),
            "effect ran"
        );

        if self.disposed.load(Ordering::SeqCst) {
            // Disposed from inside its own run: nothing may stay subscribed.
            release(&dependencies, self.subscriber_id);
            if let Some(cleanup) = on_cleanup.take() {
                cleanup();
            }
            return;
        }

        *self.dependencies.lock() = dependencies;
        *self.cleanup.lock() = on_cleanup.take();
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }

        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        release(&dependencies, self.subscriber_id);
        Runtime::unregister(self.subscriber_id);

        debug!(
            effect = ?self.subscriber_id,
            runs = self.run_count.load(Ordering::SeqCst),
            "effect disposed"
        );
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn invalidate(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            Runtime::schedule(self.subscriber_id, self.this.clone());
        }
    }

    fn run(&self) {
        self.execute();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// Cloning yields another handle to the same effect.
///
/// # Example
///
/// ```rust
/// use tally_core::reactive::{batch, Effect, Signal};
///
/// let a = Signal::new(1);
/// let b = Signal::new(2);
///
/// let (a_clone, b_clone) = (a.clone(), b.clone());
/// let effect = Effect::new(move |_| {
///     println!("sum: {}", a_clone.get() + b_clone.get());
/// });
///
/// // One run for both changes
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(effect.run_count(), 2);
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: FnMut(&mut OnCleanup) + Send + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create a new effect with explicit lifecycle options.
    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: FnMut(&mut OnCleanup) + Send + 'static,
    {
        let inner = Arc::new_cyclic(|this| EffectInner {
            subscriber_id: SubscriberId::new(),
            this: this.clone(),
            options,
            run: Mutex::new(Box::new(run)),
            dependencies: Mutex::new(Dependencies::new()),
            cleanup: Mutex::new(None),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        Runtime::register(inner.clone());
        // Writes made by the first run are flushed after it returns.
        Runtime::batch(|| inner.execute());

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    pub fn options(&self) -> EffectOptions {
        self.inner.options
    }

    /// Dispose of the effect.
    ///
    /// Runs the last registered cleanup and unsubscribes from every
    /// dependency. After disposal, the effect will not run again. Disposing
    /// twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
