//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects, plus the scopes that own effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! automatically registers that context as a dependent. When the signal's
//! value is set, all dependents are notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. A dependency change
//! only marks it dirty; it re-evaluates on the next read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Changes made inside one [`batch`] re-run each affected
//! effect once.
//!
//! ## Scopes
//!
//! A Scope owns effects on behalf of a host-side owner and disposes them when
//! it is torn down.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a cell is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! The tracking context is internal. Host code cannot see or drive the
//! computation currently being evaluated:
//!
//! ```compile_fail
//! use tally_core::reactive::ReactiveContext;
//! ```
//!
//! ```compile_fail
//! let _ = tally_core::reactive::Runtime::current_subscriber();
//! ```

mod computed;
mod context;
mod effect;
mod readable;
mod runtime;
mod scope;
mod signal;
mod subscriber;

pub use computed::{Computed, ComputedState};
pub use context::untracked;
pub use effect::{Effect, EffectOptions, OnCleanup};
pub use readable::Readable;
pub use runtime::{batch, Runtime};
pub use scope::{Scope, ScopeId};
pub use signal::{ReadonlySignal, Signal};
pub use subscriber::{SourceId, Subscriber, SubscriberId};
