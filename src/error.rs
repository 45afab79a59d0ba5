//! Error types for queue construction and blocking operations.

use std::fmt;

use thiserror::Error;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Main error type for the queue crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The requested capacity could not be rounded to a power of two
    #[error("invalid capacity: requested {requested}, resolved {resolved} is not a power of two")]
    InvalidCapacity {
        /// Capacity passed by the caller
        requested: u32,
        /// Value produced by the rounding step
        resolved: u32,
    },

    /// A caller passed an argument the operation cannot accept
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument
        message: &'static str,
    },

    /// The queue had no head element
    #[error("no element found")]
    NoSuchElement,

    /// A blocking wait was cancelled through its token
    #[error("blocking wait was interrupted")]
    Interrupted,
}

/// Returned when a blocking call is cancelled before it could complete.
///
/// Producers get their item back; consumers get `Interrupted<()>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted<T = ()>(pub T);

impl<T> Interrupted<T> {
    /// Returns the item that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Interrupted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blocking wait was interrupted")
    }
}

impl<T: fmt::Debug> std::error::Error for Interrupted<T> {}

impl<T> From<Interrupted<T>> for QueueError {
    fn from(_: Interrupted<T>) -> Self {
        QueueError::Interrupted
    }
}
