//! # Fibonacci Backoff
//!
//! Retry delays for transient HSM failures. The sequence grows more slowly
//! than exponential backoff so a flapping inventory service is retried a few
//! times within a single boot request without long stalls.
//!
//! Sequence for a 1s base and 5s cap: 1s, 1s, 2s, 3s, 5s, 5s, ...

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `base` twice and
/// capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// First delay (used for reset)
    base: Duration,
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new backoff starting at `base` and capped at `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            prev: Duration::ZERO,
            current: base.min(max),
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.base.min(self.max);
    }

    /// Stateless delay for the given attempt number (0-indexed)
    #[must_use]
    pub fn for_attempt(attempt: u32, base: Duration, max: Duration) -> Duration {
        let mut backoff = Self::new(base, max);
        let mut delay = backoff.next_backoff();
        for _ in 0..attempt {
            delay = backoff.next_backoff();
            if delay >= max {
                break;
            }
        }
        delay
    }
}
