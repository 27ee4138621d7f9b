//! Bounded Counter Service
//!
//! A small service built on one [`Signal`]. The signal is private: callers get
//! a read-only view for display and go through [`BoundedCounter::increment`]
//! to change the value. Cloning the service shares the counter, which is how a
//! host hands one instance to several components.
//!
//! # The Ceiling Check
//!
//! `increment` refuses to run once the current value is strictly greater than
//! the ceiling. With a ceiling of 10 the counter can therefore reach 11: the
//! increment from 10 to 11 passes because `10 > 10` is false, and the next one
//! fails.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{CounterError, Result};
use crate::reactive::{ReadonlySignal, Signal};

/// Ceiling used when none is configured.
pub const DEFAULT_CEILING: i64 = 10;

/// Configuration for a [`BoundedCounter`].
///
/// Missing fields fall back to their defaults: start at 0, ceiling of
/// [`DEFAULT_CEILING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Value the counter starts at.
    pub initial: i64,
    /// Highest value from which an increment is still accepted.
    pub ceiling: i64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            initial: 0,
            ceiling: DEFAULT_CEILING,
        }
    }
}

/// A counter that can only be incremented, up to a ceiling.
///
/// # Example
///
/// ```rust
/// use tally_core::{BoundedCounter, CounterError};
///
/// let counter = BoundedCounter::new(1);
/// assert_eq!(counter.increment(), Ok(1));
/// assert_eq!(counter.increment(), Ok(2));
/// assert_eq!(
///     counter.increment(),
///     Err(CounterError::CeilingExceeded { attempted: 3, ceiling: 1 })
/// );
/// assert_eq!(counter.current(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedCounter {
    counter: Signal<i64>,
    view: ReadonlySignal<i64>,
    ceiling: i64,
}

impl BoundedCounter {
    /// Create a counter starting at 0.
    pub fn new(ceiling: i64) -> Self {
        Self::from_config(CounterConfig {
            ceiling,
            ..CounterConfig::default()
        })
    }

    pub fn from_config(config: CounterConfig) -> Self {
        let counter = Signal::new(config.initial);
        let view = counter.as_readonly();
        Self {
            counter,
            view,
            ceiling: config.ceiling,
        }
    }

    /// The current value.
    ///
    /// Read through the read-only view, so computeds and effects that call
    /// this depend on the counter.
    pub fn current(&self) -> i64 {
        self.view.get()
    }

    /// A read-only handle to the counter, for display.
    pub fn counter(&self) -> ReadonlySignal<i64> {
        self.view.clone()
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    /// Add one to the counter and return the new value.
    ///
    /// Fails with [`CounterError::CeilingExceeded`] when the current value is
    /// greater than the ceiling. A failed call leaves the value unchanged.
    pub fn increment(&self) -> Result<i64> {
        let current = self.counter.get_untracked();

        if current > self.ceiling {
            warn!(current, ceiling = self.ceiling, "increment rejected");
            return Err(CounterError::CeilingExceeded {
                attempted: current.saturating_add(1),
                ceiling: self.ceiling,
            });
        }

        let attempted = current
            .checked_add(1)
            .ok_or(CounterError::Overflow { current })?;

        self.counter.set(attempted);
        trace!(value = attempted, "counter incremented");
        Ok(attempted)
    }
}

impl Default for BoundedCounter {
    fn default() -> Self {
        Self::from_config(CounterConfig::default())
    }
}
