//! Sliding-window request limiter.
//!
//! Quiver allows 100 requests per rolling minute; the limiter records when each request
//! went out and makes the caller wait once the trailing window is full.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Quiver request quota per window.
pub const QUIVER_QUOTA: usize = 100;

/// Quiver rolling window.
pub const QUIVER_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    quota: usize,
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl RateLimiter {
    /// A limiter allowing `quota` actions in any trailing `window`.
    ///
    /// A quota of zero is treated as one; a limiter that never proceeds would hang the run.
    pub fn new(quota: usize, window: Duration) -> Self {
        let quota = quota.max(1);
        Self {
            quota,
            window,
            stamps: VecDeque::with_capacity(quota),
        }
    }

    /// The limiter used against the Quiver API.
    pub fn quiver() -> Self {
        Self::new(QUIVER_QUOTA, QUIVER_WINDOW)
    }

    /// Wait until the trailing window has room, then record one action.
    pub async fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            self.prune(now);

            if self.stamps.len() < self.quota {
                self.stamps.push_back(now);
                trace!("rate limiter: {}/{} slots used", self.stamps.len(), self.quota);
                return;
            }

            // full: the oldest stamp decides when a slot frees up
            let oldest = self.stamps[0];
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            debug!("rate limit reached, waiting {wait:?}");
            sleep(wait).await;
        }
    }

    /// Number of actions recorded inside the current window.
    pub fn in_window(&mut self) -> usize {
        self.prune(Instant::now());
        self.stamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.stamps.front() {
            if now.duration_since(*oldest) >= self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn proceeds_immediately_below_quota() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_window(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_oldest_slot_to_expire() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(4)).await;
        limiter.acquire().await;

        // third call has to wait until the first stamp leaves the window
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(limiter.in_window(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_pruned_after_idle_period() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(5));
        limiter.acquire().await;
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(limiter.in_window(), 0);

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn zero_quota_is_clamped() {
        let mut limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.quota, 1);
        assert_eq!(limiter.in_window(), 0);
    }
}
