//! Token-bucket rate limiter for provider API calls
//!
//! All reconciler workers share one limiter, so total request rate against
//! the provider stays bounded no matter how wide the worker pool is. The
//! bucket refills continuously at `rate_per_sec` and holds at most `burst`
//! tokens; `acquire()` waits until a token is available.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared token-bucket limiter
///
/// A rate of 0 disables limiting entirely; `acquire()` then returns
/// immediately.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    rate_per_sec: f64,
    capacity: f64,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter refilling at `rate_per_sec` with `burst` capacity
    ///
    /// The bucket starts full, so the first `burst` acquisitions do not wait.
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            rate_per_sec: f64::from(rate_per_sec),
            capacity,
        }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(0, 1)
    }

    /// Take one token, waiting for the bucket to refill if necessary
    pub async fn acquire(&self) {
        if self.rate_per_sec == 0.0 {
            return;
        }

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.capacity);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                // Time until one whole token is available
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate_per_sec)
            };

            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        for _ in 0..100 {
            limiter.acquire().await;
        }
    }

    #[tokio::test]
    async fn burst_is_granted_without_waiting() {
        let limiter = RateLimiter::new(1, 5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn acquisitions_beyond_burst_wait_for_refill() {
        let limiter = RateLimiter::new(2, 1);
        limiter.acquire().await; // drains the bucket

        let start = Instant::now();
        limiter.acquire().await; // must wait ~0.5s for a token
        let waited = start.elapsed();

        assert!(waited >= Duration::from_millis(400), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(1), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_is_bounded() {
        let limiter = RateLimiter::new(10, 1);
        let start = Instant::now();
        for _ in 0..21 {
            limiter.acquire().await;
        }
        // 21 acquisitions at 10/s with burst 1: at least 2 seconds
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
