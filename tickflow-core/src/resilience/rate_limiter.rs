//! Fixed-rate gate for calls to an external API.
//!
//! `acquire()` blocks the calling thread until at least `1 / calls_per_second`
//! has elapsed since the previous grant. The first call never blocks. One
//! limiter is owned per source; it is not shared across sources.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `calls_per_second` grants per second.
    ///
    /// Non-positive or non-finite rates disable throttling. Rates so small
    /// that the interval overflows a `Duration` saturate to `Duration::MAX`.
    pub fn new(calls_per_second: f64) -> Self {
        let interval = if calls_per_second.is_finite() && calls_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / calls_per_second).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last_grant: Mutex::new(None),
        }
    }

    /// Minimum spacing between two grants.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until a call is allowed. Returns how long the caller waited.
    pub fn acquire(&self) -> Duration {
        let mut last = self.last_grant.lock().unwrap_or_else(PoisonError::into_inner);
        let mut waited = Duration::ZERO;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                waited = self.interval - elapsed;
                tracing::info!(sleep_ms = waited.as_millis() as u64, "rate limit hit, sleeping");
                std::thread::sleep(waited);
            }
        }

        *last = Some(Instant::now());
        waited
    }
}
