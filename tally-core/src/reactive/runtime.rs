//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds, and
//! effects. It owns the queue of effects waiting to re-run and decides when
//! that queue is flushed.
//!
//! # How It Works
//!
//! 1. Every mutation runs inside a batch. A lone `set` is a batch of one;
//!    [`batch`] groups several mutations into one.
//!
//! 2. When a signal's value changes, its subscribers are invalidated:
//!    a. Computeds are marked dirty and pass the invalidation on to their own
//!       subscribers. They recompute lazily, on next read.
//!    b. Effects enqueue themselves. An effect already in the queue is not
//!       added twice, which is what coalesces several changes into one run.
//!
//! 3. When the outermost batch ends, the queue is drained in order. Effects
//!    that mutate signals while the queue drains enqueue more work for the
//!    same drain instead of starting a nested one.
//!
//! # Thread Safety
//!
//! The queue and the batch depth are thread-local. Cells can be shared across
//! threads, but each thread batches and flushes its own notifications.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::subscriber::SubscriberId;

/// A trait for types that can be notified when dependencies change.
pub(crate) trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// One of this value's dependencies changed.
    fn invalidate(&self);

    /// Execute queued work. Only effects are ever queued.
    fn run(&self) {}

    /// Whether this value has been disposed and can be forgotten.
    fn is_disposed(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct RuntimeState {
    batch_depth: usize,
    flushing: bool,
    /// Effects waiting to re-run, in the order they were first invalidated.
    pending: IndexMap<SubscriberId, Weak<dyn Reactive>>,
    /// Effects that have not been disposed. Holding them here keeps an effect
    /// alive after its handle is dropped.
    live: IndexMap<SubscriberId, Arc<dyn Reactive>>,
}

impl RuntimeState {
    /// Remove effects that were disposed on another thread, where
    /// `Runtime::unregister` could not reach this registry.
    ///
    /// The caller must drop the result after releasing the borrow.
    fn take_disposed(&mut self) -> Vec<Arc<dyn Reactive>> {
        let disposed: Vec<SubscriberId> = self
            .live
            .iter()
            .filter(|(_, reactive)| reactive.is_disposed())
            .map(|(id, _)| *id)
            .collect();

        disposed
            .iter()
            .filter_map(|id| self.live.shift_remove(id))
            .collect()
    }
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// Decrements the batch depth when dropped, including on unwind.
struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        RUNTIME.with(|rt| rt.borrow_mut().batch_depth += 1);
        Self
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.batch_depth = rt.batch_depth.saturating_sub(1);
        });
    }
}

/// Clears the flushing flag when dropped, including on unwind.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        RUNTIME.with(|rt| rt.borrow_mut().flushing = false);
    }
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Keep an effect alive until it is unregistered.
    pub(crate) fn register(reactive: Arc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        let released = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.live.insert(id, reactive);
            rt.take_disposed()
        });
        drop(released);
    }

    /// Forget an effect: drop it from the live registry and the queue.
    ///
    /// Only the calling thread's registry is reached. An effect disposed on a
    /// thread other than the one that created it is released by its creating
    /// thread later, the next time that thread registers or counts effects.
    pub(crate) fn unregister(id: SubscriberId) {
        // `try_with`: a scope captured by an effect can be dropped while the
        // thread-local itself is being destroyed.
        let removed = RUNTIME
            .try_with(|rt| {
                let mut rt = rt.borrow_mut();
                rt.pending.shift_remove(&id);
                rt.live.shift_remove(&id)
            })
            .ok()
            .flatten();

        // Dropped outside the borrow: the effect's captures may own cells.
        drop(removed);
    }

    /// Queue an effect to re-run when the current batch ends.
    pub(crate) fn schedule(id: SubscriberId, reactive: Weak<dyn Reactive>) {
        RUNTIME.with(|rt| {
            rt.borrow_mut().pending.entry(id).or_insert(reactive);
        });
    }

    /// Run `f` as one batch.
    ///
    /// Effects invalidated inside `f` run once, after `f` returns, no matter
    /// how many of their dependencies changed. Batches nest; only the
    /// outermost one flushes.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let result = {
            let _guard = BatchGuard::enter();
            f()
        };

        if !Self::is_batching() {
            Self::flush();
        }

        result
    }

    /// Whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        RUNTIME.with(|rt| rt.borrow().batch_depth > 0)
    }

    /// Number of effects waiting to re-run.
    pub fn pending_effects() -> usize {
        RUNTIME.with(|rt| rt.borrow().pending.len())
    }

    /// Number of effects created on this thread and not yet disposed.
    pub fn live_effects() -> usize {
        let (count, released) = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            let released = rt.take_disposed();
            (rt.live.len(), released)
        });
        drop(released);
        count
    }

    /// Drain the effect queue.
    fn flush() {
        let already_flushing =
            RUNTIME.with(|rt| std::mem::replace(&mut rt.borrow_mut().flushing, true));
        if already_flushing {
            return;
        }
        let _guard = FlushGuard;

        let mut runs = 0usize;
        loop {
            let next = RUNTIME.with(|rt| rt.borrow_mut().pending.shift_remove_index(0));
            let Some((id, reactive)) = next else {
                break;
            };

            if let Some(reactive) = reactive.upgrade() {
                trace!(effect = ?id, "running queued effect");
                reactive.run();
                runs += 1;
            }
        }

        if runs > 0 {
            trace!(runs, "effect queue drained");
        }
    }
}

/// Run `f` as one batch. See [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}
