use std::hint;
use std::thread;
use std::time::Duration;

/// Iterations of pure spinning before the backoff starts yielding.
pub const SPIN_ITERATIONS: u32 = 500;
/// Iterations after which yielding goes from 1:8 to 1:4.
pub const YIELD_EIGHTH_ITERATIONS: u32 = 1000;
/// Iterations after which every step parks the thread.
pub const MAX_PROGRESSIVE_YIELD: u32 = 2000;
/// How long a fully backed-off thread parks between checks.
pub const PARK_TIMEOUT: Duration = Duration::from_micros(50);

pub struct Utils;

impl Utils {
    /// One step of the spin -> yield -> park backoff.
    ///
    /// Callers keep `n` on their own stack, starting at zero, and feed the
    /// returned value into the next call. The counter saturates at
    /// [`MAX_PROGRESSIVE_YIELD`], after which every step parks briefly.
    #[inline]
    pub fn progressive_yield(n: u32) -> u32 {
        if n <= SPIN_ITERATIONS {
            hint::spin_loop();
        } else if n < YIELD_EIGHTH_ITERATIONS {
            // yield 1:8
            if n & 0x7 == 0 {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        } else if n < MAX_PROGRESSIVE_YIELD {
            // yield 1:4
            if n & 0x3 == 0 {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        } else {
            thread::park_timeout(PARK_TIMEOUT);
            return n;
        }
        n + 1
    }

    /// Backoff for a lost CAS on a cursor.
    ///
    /// The winner is about to publish, so this never parks: it spins for
    /// [`SPIN_ITERATIONS`] steps and then yields on every step.
    #[inline]
    pub fn contention_backoff(n: u32) -> u32 {
        if n < SPIN_ITERATIONS {
            hint::spin_loop();
            n + 1
        } else {
            thread::yield_now();
            SPIN_ITERATIONS
        }
    }
}
