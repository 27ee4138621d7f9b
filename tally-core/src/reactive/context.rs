//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running a computed or an effect), we push
//! the subscriber onto the stack. When the computation completes, we pop it.
//!
//! This design supports nested reactive contexts (e.g., a computed that reads
//! from another computed). An untracked entry can be pushed to suppress
//! tracking for a region of code without disturbing the entries below it.
//!
//! # Dependency sets are per run
//!
//! Each entry starts with an empty dependency list. The list holds exactly the
//! cells read while the entry was on top of the stack. A computation that reads
//! a cell only inside a conditional branch will therefore not depend on that
//! cell during runs where the branch is skipped.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::runtime::Reactive;
use super::subscriber::{Source, SourceId};
use super::SubscriberId;

pub(crate) type Dependencies = SmallVec<[Arc<dyn Source>; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The computation being evaluated, or `None` for an untracked region.
    subscriber: Option<(SubscriberId, Weak<dyn Reactive>)>,
    /// Cells read during this evaluation, in first-read order.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub(crate) struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any cell that is read registers the
    /// subscriber as a dependent.
    pub(crate) fn enter(subscriber_id: SubscriberId, subscriber: Weak<dyn Reactive>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: Some((subscriber_id, subscriber)),
                dependencies: SmallVec::new(),
            });
        });

        Self {
            subscriber_id: Some(subscriber_id),
        }
    }

    /// Enter a region in which reads are not tracked.
    pub(crate) fn suppress() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: None,
                dependencies: SmallVec::new(),
            });
        });

        Self {
            subscriber_id: None,
        }
    }

    /// Check if reads are currently being tracked.
    #[cfg(test)]
    pub(crate) fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// Get the subscriber ID of the computation being tracked, if any.
    #[cfg(test)]
    pub(crate) fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref().map(|(id, _)| *id))
        })
    }

    /// Whether `id` is being evaluated anywhere on this thread's stack.
    pub(crate) fn is_evaluating(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|entry| matches!(entry.subscriber, Some((current, _)) if current == id))
        })
    }

    /// Record a read of `source` by the current computation.
    ///
    /// Registers the computation as a subscriber of the source. Repeated reads
    /// of the same source within one evaluation are recorded once.
    pub(crate) fn track<S>(source: &Arc<S>)
    where
        S: Source + 'static,
    {
        let source_id = source.source_id();
        let subscriber = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let (subscriber_id, subscriber) = entry.subscriber.clone()?;

            if !contains(&entry.dependencies, source_id) {
                let dependency: Arc<dyn Source> = source.clone();
                entry.dependencies.push(dependency);
            }
            Some((subscriber_id, subscriber))
        });

        if let Some((subscriber_id, subscriber)) = subscriber {
            source.subscribers().insert(subscriber_id, subscriber);
        }
    }

    /// Take the dependencies collected in this context so far.
    pub(crate) fn take_dependencies(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            // Verify we're popping the right context.
            if let Some(entry) = popped {
                let popped_id = entry.subscriber.map(|(id, _)| id);
                debug_assert_eq!(
                    popped_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, popped_id
                );
            }
        });
    }
}

/// Remove `subscriber_id` from every source in `dependencies`.
pub(crate) fn release(dependencies: &Dependencies, subscriber_id: SubscriberId) {
    for dependency in dependencies {
        dependency.subscribers().remove(subscriber_id);
    }
}

fn contains(dependencies: &Dependencies, source_id: SourceId) -> bool {
    dependencies
        .iter()
        .any(|dependency| dependency.source_id() == source_id)
}

/// Run `f` without tracking any of the reads it performs.
///
/// Reads inside `f` do not become dependencies of the computation that is
/// currently running, if any.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::suppress();
    f()
}
