//! Bounded lock-free multi-producer multi-consumer queues.
//!
//! - [`ConcurrentRingBuffer`]: a fixed-capacity ring where producers and
//!   consumers claim slots with a compare-and-swap on a padded cursor, then
//!   publish their progress with a release store.
//! - [`DisruptorBlockingQueue`]: wraps the ring with two wait conditions so
//!   producers can wait for space and consumers for elements, with timeouts
//!   and cancellation.
//!
//! How a blocked thread waits is chosen per queue with [`SpinPolicy`].
//!
//! ```rust
//! use disruptor_queue::{BlockingQueue, ConcurrentQueue, DisruptorBlockingQueue, SpinPolicy};
//! use std::time::Duration;
//!
//! let queue = DisruptorBlockingQueue::with_spin_policy(2, SpinPolicy::Spinning).unwrap();
//! queue.put("a");
//! queue.put("b");
//! assert_eq!(queue.offer_timeout("c", Duration::from_millis(1)), Err("c"));
//! assert_eq!(queue.poll(), Some("a"));
//! ```

mod blocking;
mod builder;
mod cancel;
mod capacity;
mod error;
mod ringbuffer;
mod sequence;
mod traits;
mod utils;
mod waiting;

pub use blocking::{DisruptorBlockingQueue, Iter};
pub use builder::{QueueBuilder, WithCapacity, WithSpinPolicy};
pub use cancel::CancelToken;
pub use capacity::{resolve as resolve_capacity, MAX_CAPACITY};
pub use error::{Interrupted, QueueError, Result};
pub use ringbuffer::ConcurrentRingBuffer;
pub use traits::{BlockingQueue, ConcurrentQueue, WaitStatus, WaitStrategy};
pub use waiting::{
    BlockingWaitStrategy, BusySpinWaitStrategy, Condition, ProgressiveWaitStrategy, SpinPolicy,
};
