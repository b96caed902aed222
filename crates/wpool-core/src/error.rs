//! Error types for the worker pool

use core::fmt;

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur in pool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Construction-time validation failure.
    InvalidArgument(String),

    /// `submit` called after `stop()`.
    Closed,

    /// A wait was interrupted by cancellation (pool shutdown).
    Cancelled,

    /// A wait was unblocked by pool dispose rather than by its own timeout
    /// or cancellation token — distinguished from `Cancelled` so callers can
    /// tell "the pool is going away" apart from "my own operation was
    /// cancelled".
    Interrupted,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            PoolError::Closed => write!(f, "pool is closed"),
            PoolError::Cancelled => write!(f, "operation cancelled"),
            PoolError::Interrupted => write!(f, "operation interrupted by pool shutdown"),
        }
    }
}

impl std::error::Error for PoolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PoolError::Closed;
        assert_eq!(format!("{e}"), "pool is closed");

        let e = PoolError::InvalidArgument("max_workers must be >= 1".into());
        assert_eq!(format!("{e}"), "invalid argument: max_workers must be >= 1");
    }
}
