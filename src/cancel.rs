//! Cancellation for blocking queue calls.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared flag used to interrupt blocking queue calls.
///
/// Clones share the same flag. Once cancelled, every `*_interruptibly` call
/// observing the token returns [`Interrupted`](crate::Interrupted) without
/// touching the queue, until [`reset`](CancelToken::reset) is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    alert: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.alert.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.alert.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.alert.store(false, Ordering::Release);
    }
}
