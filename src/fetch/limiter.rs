use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;

/// A shared rate limiter enforcing a randomized minimum gap between outbound requests.
///
/// Every fetch path in the crate blocks on [`RateLimiter::wait_until_ready`] before touching the
/// network. The gap for each request is drawn uniformly from the configured `[min, max]` range,
/// so consecutive requests look human-paced rather than metronomic. The draw, the comparison
/// against the shared last-request instant, and the sleep all happen under one mutex: two callers
/// can never interleave their way below the minimum gap, no matter how many extractors share the
/// limiter.
#[derive(Debug)]
pub struct RateLimiter {
    delay_range: (Duration, Duration),
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter drawing gaps uniformly from `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        assert!(min <= max, "delay range must satisfy min <= max");

        Self {
            delay_range: (min, max),
            last_request: Mutex::new(None),
        }
    }

    /// Create a rate limiter with a fixed gap, i.e. a degenerate `[gap, gap]` range.
    pub fn fixed(gap: Duration) -> Self {
        Self::new(gap, gap)
    }

    /// The configured `[min, max]` delay range.
    pub const fn delay_range(&self) -> (Duration, Duration) {
        self.delay_range
    }

    /// Synchronously wait until the configured gap since the last gate-issued request has
    /// elapsed, then mark this instant as the new last-request time.
    pub fn wait_until_ready(&self) {
        let mut last_request = self.last_request.lock().unwrap_or_else(|e| e.into_inner());

        let (min, max) = self.delay_range;
        let delay = if min == max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };

        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < delay {
                std::thread::sleep(delay - elapsed);
            }
        }

        *last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::tests::asserts::*;

    use super::*;

    #[test]
    fn first_request_is_immediate() {
        let limiter = RateLimiter::fixed(Duration::from_millis(100));

        let start = Instant::now();
        limiter.wait_until_ready();
        assert_lt!(start.elapsed(), Duration::from_millis(10));
    }

    #[test]
    fn consecutive_requests_honor_the_gap() {
        let limiter = RateLimiter::fixed(Duration::from_millis(50));

        limiter.wait_until_ready();

        for _ in 0..3 {
            let start = Instant::now();
            limiter.wait_until_ready();
            let elapsed = start.elapsed();

            assert_ge!(elapsed, Duration::from_millis(45));
            assert_lt!(elapsed, Duration::from_millis(100));
        }
    }

    #[test]
    fn randomized_gap_stays_within_range() {
        let limiter = RateLimiter::new(Duration::from_millis(20), Duration::from_millis(60));

        limiter.wait_until_ready();

        for _ in 0..5 {
            let start = Instant::now();
            limiter.wait_until_ready();
            let elapsed = start.elapsed();

            assert_ge!(elapsed, Duration::from_millis(15));
            assert_lt!(elapsed, Duration::from_millis(120));
        }
    }

    #[test]
    fn gap_is_shared_across_threads() {
        let limiter = Arc::new(RateLimiter::fixed(Duration::from_millis(40)));

        limiter.wait_until_ready();

        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.wait_until_ready())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Four gated requests after the initial one: at least 4 gaps in total.
        assert_ge!(start.elapsed(), Duration::from_millis(150));
    }
}
