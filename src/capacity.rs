//! Capacity sizing for the ring buffer.
//!
//! The ring indexes its slots with `sequence & mask`, which only works when the
//! slot count is a power of two. Requests are rounded up and clamped to
//! [`MAX_CAPACITY`].

use crate::error::{QueueError, Result};

/// Largest capacity a queue can be created with.
pub const MAX_CAPACITY: u32 = 1 << 30;

/// Returns the smallest power of two that is `>= requested`.
///
/// Requests at or above [`MAX_CAPACITY`] are clamped to it and `0` resolves to `1`.
pub fn resolve(requested: u32) -> Result<u32> {
    let resolved = if requested >= MAX_CAPACITY {
        MAX_CAPACITY
    } else {
        requested.max(1).next_power_of_two()
    };

    if resolved.is_power_of_two() {
        Ok(resolved)
    } else {
        Err(QueueError::InvalidCapacity {
            requested,
            resolved,
        })
    }
}
