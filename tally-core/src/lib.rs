//! Tally Core
//!
//! This crate provides a small fine-grained reactive runtime and a counter
//! service built on it. It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Explicit ownership scopes that dispose effects on teardown
//! - A bounded counter service exposing a read-only view of its state
//!
//! Everything runs synchronously on the calling thread. A host UI framework
//! plugs in by reading cells, creating effects inside a [`reactive::Scope`]
//! per component, and tearing that scope down when the component goes away.
//!
//! # Architecture
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `counter`: The bounded counter service
//! - `error`: Errors raised by the counter service
//!
//! # Example
//!
//! ```rust
//! use tally_core::reactive::{Computed, Scope};
//! use tally_core::BoundedCounter;
//!
//! let counter = BoundedCounter::new(10);
//! let scope = Scope::new();
//!
//! // Create a derived value
//! let service = counter.clone();
//! let derived = Computed::new(move || service.current() * 10);
//!
//! // Create an effect owned by the scope
//! let (service, derived_clone) = (counter.clone(), derived.clone());
//! scope.effect(move |_| {
//!     println!("counter: {} derived counter: {}", service.current(), derived_clone.get());
//! });
//!
//! // Effect automatically runs, prints: "counter: 1 derived counter: 10"
//! counter.increment().unwrap();
//! assert_eq!(derived.get(), 10);
//!
//! // Tearing down the scope disposes the effect
//! scope.dispose();
//! ```

pub mod counter;
pub mod error;
pub mod reactive;

pub use counter::{BoundedCounter, CounterConfig};
pub use error::{CounterError, Result};
