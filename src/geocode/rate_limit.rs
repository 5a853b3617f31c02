use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Enforces a minimum gap between the end of one call and the start of the next.
///
/// Holding a [`RatePermit`] serializes callers; the clock is stamped when the
/// permit drops, so the interval counts from the end of the previous call.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: AsyncMutex<Option<Instant>>,
}

pub struct RatePermit<'a> {
    last_call: MutexGuard<'a, Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: AsyncMutex::new(None),
        }
    }

    pub async fn acquire(&self) -> RatePermit<'_> {
        let guard = self.last_call.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                trace!(?remaining, "rate limit reached; waiting");
                sleep(remaining).await;
            }
        }
        RatePermit { last_call: guard }
    }
}

impl Drop for RatePermit<'_> {
    fn drop(&mut self) {
        *self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_not_delayed() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        drop(limiter.acquire().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_out_remainder_from_end_of_previous_call() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();

        let permit = limiter.acquire().await;
        sleep(Duration::from_millis(200)).await;
        drop(permit);
        let first_finished = Instant::now();

        sleep(Duration::from_millis(300)).await;
        let _permit = limiter.acquire().await;

        assert!(first_finished.elapsed() >= Duration::from_secs(1));
        let total = start.elapsed();
        assert!(total >= Duration::from_millis(1_200));
        assert!(total < Duration::from_millis(1_300));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_once_interval_has_passed() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        drop(limiter.acquire().await);
        sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        drop(limiter.acquire().await);
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
