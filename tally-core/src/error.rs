//! Error types for the counter service

use thiserror::Error;

/// Errors raised by [`BoundedCounter`](crate::BoundedCounter).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterError {
    /// The counter is already past its ceiling.
    #[error("maximum value reached: cannot increment to {attempted}, ceiling is {ceiling}")]
    CeilingExceeded {
        /// The value the rejected increment would have produced
        attempted: i64,
        /// The configured ceiling
        ceiling: i64,
    },

    /// The next value does not fit in an `i64`.
    #[error("counter overflow at {current}")]
    Overflow {
        /// The value the counter holds
        current: i64,
    },
}

/// Result type for counter operations
pub type Result<T> = std::result::Result<T, CounterError>;
