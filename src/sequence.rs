//! Atomic sequence counters with cache line padding to prevent false sharing.
//!
//! # Cache Line Padding and False Sharing
//!
//! ## The Problem
//! CPUs move memory between cores in whole cache lines. The queue keeps six hot
//! counters (two sequences, two cursors and two cached boundaries) that are
//! written by different threads: producers hammer the tail side, consumers the
//! head side. If two of them share a line, every CAS on one invalidates the
//! other on every core that reads it, even though the values are unrelated.
//!
//! ## The Solution
//! `AtomicSequence` occupies a cache line of its own:
//! 1. The struct is aligned to [`CACHE_LINE_SIZE`]
//! 2. Explicit padding fills the rest of the line after the atomic
//!
//! [`CACHE_LINE_SIZE`] is 128 bytes on x86_64, aarch64 and powerpc64, where the
//! spatial prefetcher pulls cache lines in pairs, and 64 bytes elsewhere. Enable
//! the `cache-line-64` feature to force 64 bytes on every target.

use std::sync::atomic::{AtomicI64, Ordering};

pub type Sequence = i64;

/// Size of the padded region around each counter (in bytes)
#[cfg(all(
    not(feature = "cache-line-64"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64")
))]
pub const CACHE_LINE_SIZE: usize = 128;

/// Size of the padded region around each counter (in bytes)
#[cfg(any(
    feature = "cache-line-64",
    not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64"))
))]
pub const CACHE_LINE_SIZE: usize = 64;

/// Padding bytes needed to fill a cache line after the atomic value
const CACHE_LINE_PADDING: usize = CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>();

/// An atomic sequence counter padded to occupy a full cache line.
///
/// # Memory Layout
/// ```text
/// |----------------------------------------------------|
/// |  AtomicI64 (8 bytes) | Padding (CACHE_LINE_SIZE - 8)|
/// |----------------------------------------------------|
/// ^                                                    ^
/// Cache line start                              Cache line end
/// ```
///
/// Loads are `Acquire` and stores are `Release`, so publishing a sequence makes
/// every write that preceded it visible to the thread that observes the new
/// value.
#[cfg_attr(
    all(
        not(feature = "cache-line-64"),
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64")
    ),
    repr(C, align(128))
)]
#[cfg_attr(
    any(
        feature = "cache-line-64",
        not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "powerpc64"))
    ),
    repr(C, align(64))
)]
#[derive(Debug)]
pub struct AtomicSequence {
    /// The actual sequence value, atomically accessed
    value: AtomicI64,
    /// Keeps neighbouring fields off this cache line
    _padding: [u8; CACHE_LINE_PADDING],
}

impl AtomicSequence {
    // Create a new Sequence with an initial value.
    pub const fn new(initial_value: Sequence) -> Self {
        AtomicSequence {
            value: AtomicI64::new(initial_value),
            _padding: [0u8; CACHE_LINE_PADDING],
        }
    }

    // Get the current value of the sequence.
    #[inline]
    pub fn get(&self) -> Sequence {
        self.value.load(Ordering::Acquire)
    }

    // Set a new value for the sequence.
    #[inline]
    pub fn set(&self, new_value: Sequence) {
        self.value.store(new_value, Ordering::Release);
    }

    /// Atomically replaces `expected` with `new_value`.
    ///
    /// Returns `true` if this thread won the exchange. Failure is the normal
    /// outcome of losing a race and is never spurious.
    #[inline]
    pub fn compare_and_set(&self, expected: Sequence, new_value: Sequence) -> bool {
        self.value
            .compare_exchange(expected, new_value, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
