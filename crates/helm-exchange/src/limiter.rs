//! Shared blocking rate limiter.
//!
//! One limiter per exchange credential set. Submission, cancellation, and
//! reconciliation polling all draw from the same budget; callers block
//! until a token is available instead of failing fast.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter.
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a limiter with `capacity` burst tokens refilled at
    /// `refill_per_sec` tokens per second. The bucket starts full.
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until one is available.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Time until one token accrues.
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };
            trace!(wait_ms = wait.as_millis() as u64, "rate limiter blocking");
            std::thread::sleep(wait);
        }
    }

    /// Take one token without blocking. Returns false if none available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_empty() {
        let limiter = RateLimiter::new(2, 0.001);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_refill() {
        let limiter = RateLimiter::new(1, 1000.0);
        assert!(limiter.try_acquire());
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_acquire_blocks_until_token() {
        let limiter = RateLimiter::new(1, 100.0);
        limiter.acquire();
        let start = Instant::now();
        limiter.acquire();
        // Second acquire had to wait roughly 10ms for a refill.
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
