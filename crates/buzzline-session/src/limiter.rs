//! Token-bucket rate limiting.

use std::time::Duration;

use tokio::time::Instant;

/// Token bucket: holds up to `burst` tokens and refills at `per_second`.
/// Each accepted event costs one token.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    burst: f64,
    per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// A zero rate or burst is raised to one.
    pub fn new(per_second: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            burst,
            per_second: f64::from(per_second.max(1)),
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    /// Takes a token if one is available.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.per_second).min(self.burst);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available.
    pub fn available(&self) -> u32 {
        self.tokens.floor() as u32
    }

    /// How long until the next token, if the bucket is empty now.
    pub fn retry_after(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.per_second)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_limited() {
        let mut limiter = RateLimiter::new(10, 10);
        let now = Instant::now();
        for i in 0..10 {
            assert!(limiter.try_acquire_at(now), "event {i} should pass");
        }
        assert!(!limiter.try_acquire_at(now), "11th event in the same instant is limited");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let mut limiter = RateLimiter::new(10, 10);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.try_acquire_at(start);
        }
        assert!(!limiter.try_acquire_at(start));
        let wait = limiter.retry_after();
        assert!(wait > Duration::from_millis(99) && wait <= Duration::from_millis(101));

        assert!(limiter.try_acquire_at(start + Duration::from_millis(100)));
        assert!(!limiter.try_acquire_at(start + Duration::from_millis(150)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_burst() {
        let mut limiter = RateLimiter::new(10, 3);
        let later = Instant::now() + Duration::from_secs(60);
        assert!(limiter.try_acquire_at(later));
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_rate_is_ten_per_second() {
        let mut limiter = RateLimiter::new(10, 10);
        let start = Instant::now();
        let mut accepted = 0;
        // 100 events spread evenly over 2 seconds
        for i in 0..100u64 {
            if limiter.try_acquire_at(start + Duration::from_millis(i * 20)) {
                accepted += 1;
            }
        }
        // initial burst of 10 plus ~10/s refill over ~2s
        assert!((28..=31).contains(&accepted), "accepted {accepted}");
    }
}
