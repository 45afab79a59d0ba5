//! Waiting strategies for producers and consumers of the blocking queue.
//!
//! # Purpose of Waiting Strategies
//!
//! A waiting strategy decides what a thread does while it cannot make
//! progress:
//! - Producers wait while the ring is full (backpressure)
//! - Consumers wait while the ring is empty
//!
//! The choice trades latency (how quickly a waiter notices the change) against
//! CPU usage and context switches.
//!
//! # Available Strategies
//!
//! ## BlockingWaitStrategy
//! Parks waiters on a condition variable and wakes them from
//! [`WaitStrategy::signal`]. Lowest CPU usage, highest wake-up latency.
//!
//! ## BusySpinWaitStrategy
//! Re-tests the condition in a tight loop. Lowest latency, burns a full core
//! per waiter. Suited to short waits on dedicated cores.
//!
//! ## ProgressiveWaitStrategy
//! Spins first, then yields the processor on one iteration in eight, then one
//! in four, and finally parks briefly between checks. The default: close to
//! spinning latency for short waits, close to blocking CPU usage for long ones.
//!
//! # Choosing a Strategy
//!
//! [`SpinPolicy`] selects a strategy when a queue is built; [`Condition`] is
//! the closed set of strategies a queue can hold.

use std::hint;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::{
    traits::{WaitStatus, WaitStrategy},
    utils::Utils,
};

/// Longest a blocked waiter sleeps before re-checking its alert and deadline.
const ALERT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

#[inline]
fn deadline_passed(deadline: Option<Instant>) -> bool {
    matches!(deadline, Some(deadline) if Instant::now() >= deadline)
}

/// Selects the wait strategy a queue uses for both of its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpinPolicy {
    /// [`BlockingWaitStrategy`]
    Blocking,
    /// [`BusySpinWaitStrategy`]
    Spinning,
    /// [`ProgressiveWaitStrategy`]
    #[default]
    Waiting,
}

pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condition: Condvar,
    waiters: AtomicUsize,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condition: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_until<P, A>(&self, blocked: P, deadline: Option<Instant>, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool,
    {
        if !blocked() {
            return WaitStatus::Ready;
        }

        self.waiters.fetch_add(1, Ordering::SeqCst);
        let status = {
            let mut guard = self.mutex.lock();
            loop {
                // pairs with the fence in `signal`: either we see the state
                // change or the signaller sees our registration
                fence(Ordering::SeqCst);
                if !blocked() {
                    break WaitStatus::Ready;
                }
                if check_alert() {
                    break WaitStatus::Alerted;
                }
                let slice = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            break WaitStatus::TimedOut;
                        }
                        (deadline - now).min(ALERT_CHECK_INTERVAL)
                    }
                    None => ALERT_CHECK_INTERVAL,
                };
                self.condition.wait_for(&mut guard, slice);
            }
        };
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        status
    }

    fn signal(&self) {
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::Relaxed) > 0 {
            let _guard = self.mutex.lock();
            self.condition.notify_all();
        }
    }
}

#[derive(Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    pub fn new() -> Self {
        BusySpinWaitStrategy {}
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_until<P, A>(&self, blocked: P, deadline: Option<Instant>, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool,
    {
        loop {
            if !blocked() {
                return WaitStatus::Ready;
            }
            if check_alert() {
                return WaitStatus::Alerted;
            }
            if deadline_passed(deadline) {
                return WaitStatus::TimedOut;
            }
            hint::spin_loop();
        }
    }

    fn signal(&self) {}
}

#[derive(Default)]
pub struct ProgressiveWaitStrategy;

impl ProgressiveWaitStrategy {
    pub fn new() -> Self {
        ProgressiveWaitStrategy {}
    }
}

impl WaitStrategy for ProgressiveWaitStrategy {
    fn wait_until<P, A>(&self, blocked: P, deadline: Option<Instant>, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool,
    {
        let mut spin = 0;
        loop {
            if !blocked() {
                return WaitStatus::Ready;
            }
            if check_alert() {
                return WaitStatus::Alerted;
            }
            if deadline_passed(deadline) {
                return WaitStatus::TimedOut;
            }
            spin = Utils::progressive_yield(spin);
        }
    }

    // parked waiters wake on their own within `PARK_TIMEOUT`
    fn signal(&self) {}
}

/// One of the three wait strategies, chosen at construction time.
pub enum Condition {
    Blocking(BlockingWaitStrategy),
    Spinning(BusySpinWaitStrategy),
    Waiting(ProgressiveWaitStrategy),
}

impl Condition {
    pub fn new(policy: SpinPolicy) -> Self {
        match policy {
            SpinPolicy::Blocking => Condition::Blocking(BlockingWaitStrategy::new()),
            SpinPolicy::Spinning => Condition::Spinning(BusySpinWaitStrategy::new()),
            SpinPolicy::Waiting => Condition::Waiting(ProgressiveWaitStrategy::new()),
        }
    }

    pub fn policy(&self) -> SpinPolicy {
        match self {
            Condition::Blocking(_) => SpinPolicy::Blocking,
            Condition::Spinning(_) => SpinPolicy::Spinning,
            Condition::Waiting(_) => SpinPolicy::Waiting,
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new(SpinPolicy::default())
    }
}

impl WaitStrategy for Condition {
    fn wait_until<P, A>(&self, blocked: P, deadline: Option<Instant>, check_alert: A) -> WaitStatus
    where
        P: Fn() -> bool,
        A: Fn() -> bool,
    {
        match self {
            Condition::Blocking(strategy) => strategy.wait_until(blocked, deadline, check_alert),
            Condition::Spinning(strategy) => strategy.wait_until(blocked, deadline, check_alert),
            Condition::Waiting(strategy) => strategy.wait_until(blocked, deadline, check_alert),
        }
    }

    fn signal(&self) {
        match self {
            Condition::Blocking(strategy) => strategy.signal(),
            Condition::Spinning(strategy) => strategy.signal(),
            Condition::Waiting(strategy) => strategy.signal(),
        }
    }
}
