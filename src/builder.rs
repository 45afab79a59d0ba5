use crate::{
    blocking::DisruptorBlockingQueue, error::Result, ringbuffer::ConcurrentRingBuffer,
    waiting::SpinPolicy,
};

/// # Queue Builder Guide
///
/// The builder follows a type-state pattern, so a queue can only be built once
/// its capacity is known:
///
/// 1. Start with the capacity (rounded up to a power of two)
/// 2. Optionally pick the waiting strategy
/// 3. Build a blocking queue, or the bare lock-free ring
///
/// ## Example Usage
/// ```rust
/// use disruptor_queue::{BlockingQueue, ConcurrentQueue, QueueBuilder, SpinPolicy};
///
/// let queue = QueueBuilder::with_capacity(1000)
///     .with_blocking_wait_strategy()
///     .build::<u64>()
///     .unwrap();
///
/// assert_eq!(queue.capacity(), 1024);
/// assert_eq!(queue.spin_policy(), SpinPolicy::Blocking);
///
/// queue.put(7);
/// assert_eq!(queue.take(), 7);
/// ```
///
/// ## Builder States
/// - `WithCapacity`: holds the requested capacity; builds with the default
///   progressive strategy
/// - `WithSpinPolicy`: holds the capacity and the chosen [`SpinPolicy`]
///
/// The spin policy only matters to the blocking queue. The bare ring never
/// waits, so `build_concurrent` ignores it.
#[derive(Debug)]
pub struct QueueBuilder {}

#[derive(Debug, Clone, Copy)]
pub struct WithCapacity {
    capacity: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct WithSpinPolicy {
    with_capacity: WithCapacity,
    policy: SpinPolicy,
}

impl QueueBuilder {
    pub fn with_capacity(capacity: usize) -> WithCapacity {
        WithCapacity { capacity }
    }
}

impl WithCapacity {
    pub fn with_spin_policy(self, policy: SpinPolicy) -> WithSpinPolicy {
        WithSpinPolicy {
            with_capacity: self,
            policy,
        }
    }

    pub fn with_blocking_wait_strategy(self) -> WithSpinPolicy {
        self.with_spin_policy(SpinPolicy::Blocking)
    }

    pub fn with_busy_spin_wait_strategy(self) -> WithSpinPolicy {
        self.with_spin_policy(SpinPolicy::Spinning)
    }

    pub fn with_waiting_wait_strategy(self) -> WithSpinPolicy {
        self.with_spin_policy(SpinPolicy::Waiting)
    }

    pub fn build<T: Send>(self) -> Result<DisruptorBlockingQueue<T>> {
        self.with_spin_policy(SpinPolicy::default()).build()
    }

    pub fn build_concurrent<T: Send>(self) -> Result<ConcurrentRingBuffer<T>> {
        ConcurrentRingBuffer::new(self.capacity)
    }
}

impl WithSpinPolicy {
    pub fn build<T: Send>(self) -> Result<DisruptorBlockingQueue<T>> {
        DisruptorBlockingQueue::with_spin_policy(self.with_capacity.capacity, self.policy)
    }

    pub fn build_concurrent<T: Send>(self) -> Result<ConcurrentRingBuffer<T>> {
        self.with_capacity.build_concurrent()
    }
}
