//! A blocking queue built on [`ConcurrentRingBuffer`].
//!
//! # Overview
//!
//! [`DisruptorBlockingQueue`] pairs the lock-free ring with two wait
//! conditions:
//! - **not full**: producers wait on it while the ring has no free slot;
//!   every successful poll, batch removal, `remove` or `clear` signals it
//! - **not empty**: consumers wait on it while the ring has no element;
//!   every successful offer signals it
//!
//! Both conditions use the strategy picked by the queue's [`SpinPolicy`].
//!
//! # Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use disruptor_queue::{BlockingQueue, DisruptorBlockingQueue};
//!
//! let queue = Arc::new(DisruptorBlockingQueue::new(2).unwrap());
//!
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for i in 0..10 {
//!             queue.put(i);
//!         }
//!     })
//! };
//!
//! let received: Vec<i32> = (0..10).map(|_| queue.take()).collect();
//! producer.join().unwrap();
//! assert_eq!(received, (0..10).collect::<Vec<_>>());
//! ```
//!
//! # Cancellation
//!
//! `put_interruptibly` and `take_interruptibly` take a [`CancelToken`]. A
//! cancelled call returns [`Interrupted`] without having claimed any slot, so
//! the queue is exactly as it would be had the call never been made.

use std::fmt;
use std::ptr;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::{
    cancel::CancelToken,
    error::{Interrupted, QueueError, Result},
    ringbuffer::ConcurrentRingBuffer,
    traits::{BlockingQueue, ConcurrentQueue, WaitStatus, WaitStrategy},
    waiting::{Condition, SpinPolicy},
};

pub struct DisruptorBlockingQueue<T> {
    ring: ConcurrentRingBuffer<T>,
    not_full: Condition,
    not_empty: Condition,
}

impl<T: Send> DisruptorBlockingQueue<T> {
    /// Creates a queue with the default [`SpinPolicy::Waiting`] strategy.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_spin_policy(capacity, SpinPolicy::default())
    }

    pub fn with_spin_policy(capacity: usize, policy: SpinPolicy) -> Result<Self> {
        let ring = ConcurrentRingBuffer::new(capacity)?;
        debug!(capacity = ring.capacity(), ?policy, "creating blocking queue");
        Ok(Self {
            ring,
            not_full: Condition::new(policy),
            not_empty: Condition::new(policy),
        })
    }

    /// Creates a queue and offers every item of `items` to it.
    ///
    /// Items that do not fit are dropped.
    pub fn with_items<I>(capacity: usize, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let queue = Self::new(capacity)?;
        queue.add_all(items);
        Ok(queue)
    }

    pub fn spin_policy(&self) -> SpinPolicy {
        self.not_empty.policy()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Returns a copy of the head element, or [`QueueError::NoSuchElement`].
    pub fn element(&self) -> Result<T>
    where
        T: Clone,
    {
        self.peek().ok_or(QueueError::NoSuchElement)
    }

    /// Offers each item in turn, returning how many were inserted.
    ///
    /// Items that find the queue full are dropped.
    pub fn add_all<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let added = items
            .into_iter()
            .map(|item| self.ring.offer(item))
            .filter(std::result::Result::is_ok)
            .count();
        if added > 0 {
            self.not_empty.signal();
        }
        added
    }

    /// Removes every element equal to `item`.
    ///
    /// Stalls all producers and consumers while it compacts the ring, so keep it
    /// off hot paths.
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_where(|queued| queued == item) > 0
    }

    /// Removes every element that appears in `items`.
    pub fn remove_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        self.remove_where(|queued| items.contains(queued)) > 0
    }

    /// Removes every element that does not appear in `items`.
    pub fn retain_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        self.remove_where(|queued| !items.contains(queued)) > 0
    }

    pub fn contains_all(&self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        items.iter().all(|item| self.contains(item))
    }

    fn remove_where<F>(&self, matches: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let removed = self.ring.remove_matching(matches);
        if removed > 0 {
            debug!(removed, "removed elements from queue");
            self.not_full.signal();
        }
        removed
    }

    /// Drains everything currently queued into `dest`.
    pub fn drain_all<C: Extend<T> + ?Sized>(&self, dest: &mut C) -> usize {
        self.drain_to(dest, self.size())
    }

    /// Moves up to `max` elements into another queue without blocking.
    ///
    /// Fails with [`QueueError::InvalidArgument`] if `dest` is this queue. The
    /// move is bounded by the room `dest` has when the call starts. Returns the
    /// number of elements moved together with any element that lost the room
    /// in `dest` to a concurrent producer; those are handed back in FIFO order
    /// rather than waited on.
    pub fn drain_into(&self, dest: &DisruptorBlockingQueue<T>, max: usize) -> Result<(usize, Vec<T>)> {
        if ptr::eq(self, dest) {
            return Err(QueueError::InvalidArgument {
                message: "can not drain a queue into itself",
            });
        }

        let mut batch = Vec::new();
        self.drain_to(&mut batch, max.min(dest.remaining_capacity()));
        Ok(dest.offer_all(batch))
    }

    // Offers `items` in order, stopping at the first rejection.
    fn offer_all(&self, items: Vec<T>) -> (usize, Vec<T>) {
        let mut items = items.into_iter();
        let mut moved = 0;
        for item in items.by_ref() {
            if let Err(back) = self.offer(item) {
                let mut rejected = vec![back];
                rejected.extend(items);
                debug!(rejected = rejected.len(), "destination queue filled up");
                return (moved, rejected);
            }
            moved += 1;
        }
        (moved, Vec::new())
    }

    /// Returns an iterator over a snapshot of the queued elements.
    ///
    /// Elements are cloned while the head of the queue is briefly claimed;
    /// later changes to the queue are not reflected.
    pub fn iter(&self) -> Iter<'_, T>
    where
        T: Clone,
    {
        Iter {
            queue: self,
            items: self.ring.snapshot().into_iter(),
            last: None,
        }
    }

    fn put_until<A>(&self, mut item: T, check_alert: A) -> std::result::Result<(), Interrupted<T>>
    where
        A: Fn() -> bool,
    {
        loop {
            match self.offer(item) {
                Ok(()) => return Ok(()),
                Err(back) => item = back,
            }
            if self.not_full.wait(|| self.ring.is_full(), &check_alert) == WaitStatus::Alerted {
                debug!("put interrupted");
                return Err(Interrupted(item));
            }
        }
    }

    fn take_until<A>(&self, check_alert: A) -> std::result::Result<T, Interrupted>
    where
        A: Fn() -> bool,
    {
        loop {
            if let Some(item) = self.poll() {
                return Ok(item);
            }
            if self.not_empty.wait(|| self.ring.is_empty(), &check_alert) == WaitStatus::Alerted {
                debug!("take interrupted");
                return Err(Interrupted(()));
            }
        }
    }
}

impl<T: Send> ConcurrentQueue<T> for DisruptorBlockingQueue<T> {
    fn offer(&self, item: T) -> std::result::Result<(), T> {
        self.ring.offer(item)?;
        self.not_empty.signal();
        Ok(())
    }

    fn poll(&self) -> Option<T> {
        let item = self.ring.poll()?;
        self.not_full.signal();
        Some(item)
    }

    fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.ring.peek()
    }

    fn size(&self) -> usize {
        self.ring.size()
    }

    fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.ring.contains(item)
    }

    fn remove_batch(&self, buf: &mut [Option<T>]) -> usize {
        let removed = self.ring.remove_batch(buf);
        if removed > 0 {
            self.not_full.signal();
        }
        removed
    }

    fn clear(&self) {
        self.ring.clear();
        self.not_full.signal();
    }
}

impl<T: Send> BlockingQueue<T> for DisruptorBlockingQueue<T> {
    fn put(&self, mut item: T) {
        while let Err(Interrupted(back)) = self.put_until(item, || false) {
            item = back;
        }
    }

    fn put_interruptibly(&self, item: T, token: &CancelToken) -> std::result::Result<(), Interrupted<T>> {
        if token.is_cancelled() {
            return Err(Interrupted(item));
        }
        self.put_until(item, || token.is_cancelled())
    }

    fn take(&self) -> T {
        loop {
            if let Ok(item) = self.take_until(|| false) {
                return item;
            }
        }
    }

    fn take_interruptibly(&self, token: &CancelToken) -> std::result::Result<T, Interrupted> {
        if token.is_cancelled() {
            return Err(Interrupted(()));
        }
        self.take_until(|| token.is_cancelled())
    }

    fn offer_timeout(&self, mut item: T, timeout: Duration) -> std::result::Result<(), T> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            match self.offer(item) {
                Ok(()) => return Ok(()),
                Err(back) => item = back,
            }
            let status = self.not_full.wait_until(|| self.ring.is_full(), deadline, || false);
            if status == WaitStatus::TimedOut {
                trace!(?timeout, "offer timed out");
                return Err(item);
            }
        }
    }

    fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(item) = self.poll() {
                return Some(item);
            }
            let status = self.not_empty.wait_until(|| self.ring.is_empty(), deadline, || false);
            if status == WaitStatus::TimedOut {
                trace!(?timeout, "poll timed out");
                return None;
            }
        }
    }

    fn drain_to<C: Extend<T> + ?Sized>(&self, dest: &mut C, max: usize) -> usize {
        let mut batch: Vec<Option<T>> = Vec::new();
        batch.resize_with(max.min(self.size()), || None);
        let drained = self.remove_batch(&mut batch);
        dest.extend(batch.into_iter().flatten());
        if drained > 0 {
            debug!(drained, "drained queue");
        }
        drained
    }
}

impl<T> fmt::Debug for DisruptorBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisruptorBlockingQueue")
            .field("ring", &self.ring)
            .field("policy", &self.not_empty.policy())
            .finish()
    }
}

/// Snapshot iterator returned by [`DisruptorBlockingQueue::iter`].
pub struct Iter<'a, T> {
    queue: &'a DisruptorBlockingQueue<T>,
    items: std::vec::IntoIter<T>,
    last: Option<T>,
}

impl<T: Send + Clone + PartialEq> Iter<'_, T> {
    /// Removes the element most recently returned by `next` from the queue.
    ///
    /// Every queued element equal to it is removed. Returns `false` if `next`
    /// has not been called, or the element was already gone.
    pub fn remove(&mut self) -> bool {
        match self.last.take() {
            Some(last) => self.queue.remove(&last),
            None => false,
        }
    }
}

impl<T: Clone> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.items.next()?;
        self.last = Some(item.clone());
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<'a, T: Send + Clone> IntoIterator for &'a DisruptorBlockingQueue<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
