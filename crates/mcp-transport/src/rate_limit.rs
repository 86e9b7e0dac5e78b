//! Optional client-side token-bucket rate limiting (§4.3.3 "Rate
//! limiting").

use mcp_transport_traits::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks request timestamps over a monotonic clock and blocks `acquire`
/// (sleeping in 1 s increments) while the bucket is exceeded. Entries older
/// than the configured interval are pruned under the mutex on every call.
pub struct TokenBucket {
    capacity: u32,
    interval: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            capacity: config.capacity,
            interval: config.interval,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until a slot is free, then records the admission.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().unwrap();
                let cutoff = Instant::now() - self.interval;
                while timestamps.front().is_some_and(|t| *t < cutoff) {
                    timestamps.pop_front();
                }

                if (timestamps.len() as u32) < self.capacity {
                    timestamps.push_back(Instant::now());
                    None
                } else {
                    Some(Duration::from_secs(1))
                }
            };

            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_capacity_without_blocking() {
        let bucket = TokenBucket::new(RateLimitConfig { capacity: 3, interval: Duration::from_secs(60) });
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn prunes_entries_older_than_interval() {
        let bucket = TokenBucket::new(RateLimitConfig { capacity: 1, interval: Duration::from_millis(50) });
        bucket.acquire().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
