//! Outbound write rate limiting

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::traits::RateLimiter;

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self) {}
}

/// One permit every `1 / rate` seconds. A burst after an idle period is
/// not allowed; missed permits are not accumulated.
#[derive(Debug)]
pub struct FixedRateLimiter {
    ticker: Mutex<Interval>,
    per_second: u32,
}

impl FixedRateLimiter {
    /// Must be called inside a tokio runtime
    pub fn per_second(per_second: u32) -> Self {
        let per_second = per_second.max(1);
        let mut ticker = interval(Duration::from_secs(1) / per_second);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker: Mutex::new(ticker),
            per_second,
        }
    }

    pub fn rate(&self) -> u32 {
        self.per_second
    }
}

#[async_trait]
impl RateLimiter for FixedRateLimiter {
    async fn acquire(&self) {
        self.ticker.lock().await.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_unlimited_is_immediate() {
        let limiter = Unlimited;
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_rate_spaces_permits() {
        let limiter = FixedRateLimiter::per_second(20);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // First permit is immediate, the next four are 50ms apart
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let limiter = rt.block_on(async { FixedRateLimiter::per_second(0) });
        assert_eq!(limiter.rate(), 1);
    }
}
