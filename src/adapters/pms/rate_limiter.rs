use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces outgoing PMS requests at least `1 / requests_per_second` apart.
/// Callers queue on the slot, so concurrent requests are paced too.
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            tracing::warn!(
                "PMS rate limiter initialized with non-positive rate ({requests_per_second} req/s), no pacing applied"
            );
            Duration::ZERO
        };
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next
            && at > Instant::now()
        {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.min_interval);
    }
}
