//! The lock-free bounded MPMC ring buffer.
//!
//! # Claim-then-publish
//!
//! Each side of the ring has two counters:
//! - a **sequence** (`head` / `tail`) holding the published position, the one
//!   other threads use to decide whether the ring is empty or full
//! - a **cursor** (`head_cursor` / `tail_cursor`) that threads CAS from the
//!   published sequence to sequence + 1 to claim the next slot
//!
//! A producer that wins the tail cursor writes its slot and only then publishes
//! `tail + 1`. Consumers test `tail > head` against the published value, so a
//! slot that is claimed but not yet written is never visible to them. The same
//! holds on the head side: a producer only reuses a slot once the consumer that
//! emptied it has published the new head.
//!
//! While a side is claimed its cursor is ahead of its sequence, so every other
//! CAS from the published value fails until the owner publishes. `clear` and
//! `remove_matching` claim both sides, always head before tail.
//!
//! # Cached boundaries
//!
//! `head_cache` and `tail_cache` hold the last head seen by producers and the
//! last tail seen by consumers. Sequences only grow, so a stale cache is a safe
//! lower bound; it is refreshed only when it says the ring is full (or empty).

use std::cell::UnsafeCell;
use std::fmt;

use tracing::debug;

use crate::{
    capacity,
    error::Result,
    sequence::{AtomicSequence, Sequence},
    traits::ConcurrentQueue,
    utils::Utils,
};

/// Restores a claimed cursor when dropped, including on unwind.
struct Claim<'a> {
    cursor: &'a AtomicSequence,
    release_to: Sequence,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.cursor.set(self.release_to);
    }
}

/// A bounded lock-free multi-producer/multi-consumer queue.
///
/// The capacity is rounded up to a power of two at construction and never
/// changes. All operations return promptly: a full ring hands the item back,
/// an empty ring returns `None`.
///
/// # Safety
/// Slots live in `UnsafeCell`s. A thread only touches a slot while it owns the
/// cursor covering it: producers own slot `tail` after winning `tail_cursor`,
/// consumers own the published range `[head, tail)` while they hold
/// `head_cursor`.
pub struct ConcurrentRingBuffer<T> {
    capacity: i64,
    mask: i64,
    tail: AtomicSequence,
    tail_cursor: AtomicSequence,
    head_cache: AtomicSequence,
    buffer: Box<[UnsafeCell<Option<T>>]>,
    tail_cache: AtomicSequence,
    head: AtomicSequence,
    head_cursor: AtomicSequence,
}

// SAFETY: elements are moved between threads but only ever accessed by the
// thread owning the matching cursor, so `T: Send` is enough.
unsafe impl<T: Send> Send for ConcurrentRingBuffer<T> {}
// SAFETY: see above; no two threads hold a reference into the same slot.
unsafe impl<T: Send> Sync for ConcurrentRingBuffer<T> {}

impl<T> ConcurrentRingBuffer<T> {
    /// Creates a ring with at least `capacity` slots.
    ///
    /// Fails with [`QueueError::InvalidCapacity`](crate::QueueError) if the
    /// capacity cannot be rounded to a power of two.
    pub fn new(capacity: usize) -> Result<Self> {
        let requested = u32::try_from(capacity).unwrap_or(u32::MAX);
        let size = capacity::resolve(requested)? as usize;
        debug!(requested = capacity, capacity = size, "creating ring buffer");

        Ok(Self {
            capacity: size as i64,
            mask: size as i64 - 1,
            tail: AtomicSequence::new(0),
            tail_cursor: AtomicSequence::new(0),
            head_cache: AtomicSequence::new(0),
            buffer: (0..size).map(|_| UnsafeCell::new(None)).collect(),
            tail_cache: AtomicSequence::new(0),
            head: AtomicSequence::new(0),
            head_cursor: AtomicSequence::new(0),
        })
    }

    #[inline]
    fn slot(&self, sequence: Sequence) -> *mut Option<T> {
        self.buffer[(sequence & self.mask) as usize].get()
    }

    /// Whether every slot is occupied. A snapshot, like [`size`](ConcurrentQueue::size).
    pub fn is_full(&self) -> bool {
        self.tail.get() - self.head.get() >= self.capacity
    }

    /// Whether slot `queue_start + capacity` is free, refreshing the cached head
    /// only when the cache says the ring is full.
    #[inline]
    fn has_room(&self, queue_start: Sequence) -> bool {
        if self.head_cache.get() > queue_start {
            return true;
        }
        let head = self.head.get();
        self.head_cache.set(head);
        head > queue_start
    }

    #[inline]
    fn has_items(&self, head: Sequence) -> bool {
        if self.tail_cache.get() > head {
            return true;
        }
        let tail = self.tail.get();
        self.tail_cache.set(tail);
        tail > head
    }

    fn claim_head(&self) -> Claim<'_> {
        let mut spin = 0;
        loop {
            let head = self.head.get();
            if self.head_cursor.compare_and_set(head, head + 1) {
                return Claim {
                    cursor: &self.head_cursor,
                    release_to: head,
                };
            }
            spin = Utils::progressive_yield(spin);
        }
    }

    fn claim_tail(&self) -> Claim<'_> {
        let mut spin = 0;
        loop {
            let tail = self.tail.get();
            if self.tail_cursor.compare_and_set(tail, tail + 1) {
                return Claim {
                    cursor: &self.tail_cursor,
                    release_to: tail,
                };
            }
            spin = Utils::progressive_yield(spin);
        }
    }

    /// Runs `f` over the published range `[head, tail)` while holding the head
    /// cursor, then hands the cursor back untouched.
    fn with_head_claimed<R>(&self, f: impl FnOnce(Sequence, Sequence) -> R) -> R {
        let claim = self.claim_head();
        let head = claim.release_to;
        // producers may keep appending; the range read here is a snapshot
        let tail = self.tail.get();
        f(head, tail)
    }

    /// Clones the queued elements in FIFO order.
    pub(crate) fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.with_head_claimed(|head, tail| {
            (head..tail)
                // SAFETY: the head claim gives exclusive access to published slots
                .filter_map(|sequence| unsafe { (*self.slot(sequence)).clone() })
                .collect()
        })
    }

    /// Removes every element for which `matches` returns `true`, keeping the
    /// order of the rest. Returns how many were removed.
    ///
    /// Claims both ends of the ring for the duration of the call, stalling
    /// every producer and consumer. O(size).
    pub(crate) fn remove_matching<F>(&self, mut matches: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut head_claim = self.claim_head();
        let tail_claim = self.claim_tail();
        let head = head_claim.release_to;
        let tail = tail_claim.release_to;

        // user code runs before anything moves, so a panic leaves the ring intact
        let hits: Vec<bool> = (head..tail)
            // SAFETY: both cursors are held
            .map(|sequence| unsafe { (*self.slot(sequence)).as_ref() }.is_some_and(&mut matches))
            .collect();

        let mut removed = Vec::new();
        let mut write = tail;
        for (offset, hit) in hits.iter().enumerate().rev() {
            let sequence = head + offset as Sequence;
            // SAFETY: both cursors are held
            let value = unsafe { (*self.slot(sequence)).take() };
            if *hit {
                removed.extend(value);
            } else {
                write -= 1;
                unsafe { *self.slot(write) = value };
            }
        }

        // survivors now fill [write, tail)
        let count = write - head;
        drop(tail_claim);
        head_claim.release_to = head + count;
        drop(head_claim);
        if count > 0 {
            self.head.set(head + count);
        }
        count as usize
    }
}

impl<T: Send> ConcurrentQueue<T> for ConcurrentRingBuffer<T> {
    fn offer(&self, item: T) -> std::result::Result<(), T> {
        let mut spin = 0;
        loop {
            let tail = self.tail.get();
            let queue_start = tail - self.capacity;

            if self.has_room(queue_start) {
                if self.tail_cursor.compare_and_set(tail, tail + 1) {
                    // SAFETY: winning the tail cursor makes this thread the only
                    // writer of slot `tail`, which its consumer has already emptied
                    unsafe { *self.slot(tail) = Some(item) };
                    self.tail.set(tail + 1);
                    return Ok(());
                }
                // another producer claimed this sequence, retry
            } else {
                return Err(item);
            }

            spin = Utils::contention_backoff(spin);
        }
    }

    fn poll(&self) -> Option<T> {
        let mut spin = 0;
        loop {
            let head = self.head.get();

            if self.has_items(head) {
                if self.head_cursor.compare_and_set(head, head + 1) {
                    // SAFETY: slot `head` is published and this thread owns the head cursor
                    let item = unsafe { (*self.slot(head)).take() };
                    self.head.set(head + 1);
                    debug_assert!(item.is_some(), "published slot {head} was empty");
                    return item;
                }
                // another consumer took this sequence, retry
            } else {
                return None;
            }

            spin = Utils::contention_backoff(spin);
        }
    }

    fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.with_head_claimed(|head, tail| {
            if tail > head {
                // SAFETY: the head claim gives exclusive access to published slots
                unsafe { (*self.slot(head)).clone() }
            } else {
                None
            }
        })
    }

    fn size(&self) -> usize {
        (self.tail.get() - self.head.get()).clamp(0, self.capacity) as usize
    }

    fn capacity(&self) -> usize {
        self.capacity as usize
    }

    fn is_empty(&self) -> bool {
        self.tail.get() <= self.head.get()
    }

    fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.with_head_claimed(|head, tail| {
            // SAFETY: the head claim gives exclusive access to published slots
            (head..tail).any(|sequence| unsafe { (*self.slot(sequence)).as_ref() } == Some(item))
        })
    }

    fn remove_batch(&self, buf: &mut [Option<T>]) -> usize {
        if buf.is_empty() {
            return 0;
        }

        let mut spin = 0;
        loop {
            let head = self.head.get();
            let count = (self.tail.get() - head).min(buf.len() as i64);
            if count <= 0 {
                return 0;
            }

            // one CAS claims the whole range [head, head + count)
            if self.head_cursor.compare_and_set(head, head + count) {
                for (offset, dest) in buf.iter_mut().take(count as usize).enumerate() {
                    // SAFETY: the range is published and claimed by this thread
                    *dest = unsafe { (*self.slot(head + offset as Sequence)).take() };
                }
                self.head.set(head + count);
                return count as usize;
            }

            spin = Utils::contention_backoff(spin);
        }
    }

    fn clear(&self) {
        let mut head_claim = self.claim_head();
        let mut tail_claim = self.claim_tail();
        let head = head_claim.release_to;
        let tail = tail_claim.release_to;

        let cleared: Vec<T> = (head..tail)
            // SAFETY: both cursors are held
            .filter_map(|sequence| unsafe { (*self.slot(sequence)).take() })
            .collect();

        // the claimed tail slot is skipped: both sides restart at tail + 1
        let next = tail + 1;
        tail_claim.release_to = next;
        drop(tail_claim);
        self.tail.set(next);
        head_claim.release_to = next;
        drop(head_claim);
        self.head.set(next);

        debug!(cleared = cleared.len(), "cleared ring buffer");
        drop(cleared);
    }
}

impl<T> fmt::Debug for ConcurrentRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentRingBuffer")
            .field("capacity", &self.capacity)
            .field("head", &self.head.get())
            .field("tail", &self.tail.get())
            .finish()
    }
}
