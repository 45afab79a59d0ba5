//! Core traits defining the queue contracts and the wait-strategy interface.
//!
//! # Core Traits Overview
//!
//! - [`ConcurrentQueue`]: the non-blocking bounded-queue contract. Full and
//!   empty are ordinary outcomes, never errors.
//! - [`BlockingQueue`]: adds operations that suspend the caller until space or
//!   an element is available, optionally bounded by a timeout or cancelled
//!   through a [`CancelToken`].
//! - [`WaitStrategy`]: how a thread waits for a "queue is full" or "queue is
//!   empty" predicate to clear.
//!
//! # Examples
//!
//! ```rust
//! use disruptor_queue::{ConcurrentQueue, ConcurrentRingBuffer};
//!
//! let queue = ConcurrentRingBuffer::new(4).unwrap();
//! assert!(queue.offer(1).is_ok());
//! assert_eq!(queue.poll(), Some(1));
//! assert_eq!(queue.poll(), None);
//! ```

use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::Interrupted;

/// The non-blocking bounded-queue contract.
///
/// Every operation returns promptly. Contention between threads is resolved
/// internally and only shows up as latency.
pub trait ConcurrentQueue<T>: Send + Sync {
    /// Inserts `item` at the tail, or hands it back if the queue is full.
    fn offer(&self, item: T) -> Result<(), T>;

    /// Removes the head element, or returns `None` if the queue is empty.
    fn poll(&self) -> Option<T>;

    /// Returns a copy of the head element without removing it.
    ///
    /// Advisory only: a concurrent `poll` may take the element right after.
    fn peek(&self) -> Option<T>
    where
        T: Clone;

    /// Best-effort element count; may be stale under concurrent modification.
    fn size(&self) -> usize;

    /// Number of slots in the ring.
    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Whether an element equal to `item` is currently queued.
    fn contains(&self, item: &T) -> bool
    where
        T: PartialEq;

    /// Moves up to `buf.len()` elements, in FIFO order, into the front of `buf`.
    ///
    /// Returns how many elements were moved.
    fn remove_batch(&self, buf: &mut [Option<T>]) -> usize;

    /// Drops every queued element.
    fn clear(&self);
}

/// The blocking-queue contract layered on top of [`ConcurrentQueue`].
pub trait BlockingQueue<T>: ConcurrentQueue<T> {
    /// Inserts `item`, waiting for space as long as necessary.
    fn put(&self, item: T);

    /// Like [`put`](BlockingQueue::put) but gives up when `token` is cancelled.
    fn put_interruptibly(&self, item: T, token: &CancelToken) -> Result<(), Interrupted<T>>;

    /// Removes the head element, waiting for one as long as necessary.
    fn take(&self) -> T;

    /// Like [`take`](BlockingQueue::take) but gives up when `token` is cancelled.
    fn take_interruptibly(&self, token: &CancelToken) -> Result<T, Interrupted>;

    /// Inserts `item`, waiting at most `timeout` for space.
    fn offer_timeout(&self, item: T, timeout: Duration) -> Result<(), T>;

    /// Removes the head element, waiting at most `timeout` for one.
    fn poll_timeout(&self, timeout: Duration) -> Option<T>;

    fn remaining_capacity(&self) -> usize {
        self.capacity() - self.size()
    }

    /// Moves up to `max` elements into `dest`, returning how many were moved.
    fn drain_to<C: Extend<T> + ?Sized>(&self, dest: &mut C, max: usize) -> usize;
}

/// Outcome of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The blocking predicate cleared.
    Ready,
    /// The deadline passed while the predicate still held.
    TimedOut,
    /// The alert check fired before the predicate cleared.
    Alerted,
}

impl WaitStatus {
    pub fn is_ready(self) -> bool {
        self == WaitStatus::Ready
    }
}

/// Defines how threads wait for a queue condition to clear.
///
/// `blocked` is the condition test: it returns `true` while the waiter must
/// keep waiting (the queue is full, or empty). Implementations re-check it on
/// every wake-up, so spurious and lost wake-ups only cost latency.
/// `check_alert` is polled alongside it and ends the wait with
/// [`WaitStatus::Alerted`] when it returns `true`.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use disruptor_queue::{BusySpinWaitStrategy, WaitStrategy, WaitStatus};
///
/// let full = AtomicBool::new(false);
/// let strategy = BusySpinWaitStrategy::new();
/// let status = strategy.wait(|| full.load(Ordering::Acquire), || false);
/// assert_eq!(status, WaitStatus::Ready);
/// ```
pub trait WaitStrategy: Send + Sync {
    /// Waits until `blocked` clears, `deadline` passes or `check_alert` fires.
    ///
    /// A `None` deadline waits indefinitely.
    fn wait_until<P, A>(&self, blocked: P, deadline: Option<Instant>, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool;

    /// Wakes every thread currently waiting on this strategy.
    fn signal(&self);

    fn wait<P, A>(&self, blocked: P, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool,
    {
        self.wait_until(blocked, None, check_alert)
    }

    /// Bounded wait. The deadline is computed once, up front.
    fn wait_timeout<P, A>(&self, blocked: P, timeout: Duration, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool,
    {
        // a timeout too large to represent waits forever
        self.wait_until(blocked, Instant::now().checked_add(timeout), check_alert)
    }
}
