//! `RateLimiter`. One bucket per upstream hostname; each bucket is guarded
//! by its own async mutex so waiting on one host never blocks requests to
//! another.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use mcpay_config::RateLimitConfig;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone)]
struct RateBucket {
    window_reset_at: Instant,
    requests_in_window: u32,
    last_request_at: Option<Instant>,
}

impl RateBucket {
    fn fresh(now: Instant) -> Self {
        Self {
            window_reset_at: now + Duration::from_secs(60),
            requests_in_window: 0,
            last_request_at: None,
        }
    }
}

pub struct RateLimitTable {
    buckets: RwLock<HashMap<String, Arc<AsyncMutex<RateBucket>>>>,
    max_per_minute: u32,
    min_request_delay: Duration,
}

impl RateLimitTable {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            max_per_minute: config.max_requests_per_minute,
            min_request_delay: Duration::from_millis(config.min_request_delay_ms),
        }
    }

    fn bucket_for(&self, host: &str) -> Arc<AsyncMutex<RateBucket>> {
        if let Some(bucket) = self.buckets.read().unwrap().get(host) {
            return bucket.clone();
        }
        let mut buckets = self.buckets.write().unwrap();
        buckets
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(RateBucket::fresh(Instant::now()))))
            .clone()
    }

    /// Blocks (cooperatively — cancellation-safe) until the caller holds
    /// permission for exactly one upstream call to `host`.
    pub async fn acquire(&self, host: &str) {
        let started = Instant::now();
        let bucket = self.bucket_for(host);
        loop {
            let wait = {
                let mut guard = bucket.lock().await;
                let now = Instant::now();

                if now > guard.window_reset_at {
                    *guard = RateBucket::fresh(now);
                }

                let too_soon = guard
                    .last_request_at
                    .map(|last| now.duration_since(last) < self.min_request_delay)
                    .unwrap_or(false);
                let window_full = guard.requests_in_window >= self.max_per_minute;

                if too_soon || window_full {
                    let elapsed = guard
                        .last_request_at
                        .map(|last| now.duration_since(last))
                        .unwrap_or(self.min_request_delay);
                    Some(self.min_request_delay.saturating_sub(elapsed).max(Duration::from_millis(1)))
                } else {
                    guard.requests_in_window += 1;
                    guard.last_request_at = Some(now);
                    None
                }
            };

            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => {
                    metrics::histogram!("gateway.rate_limit.wait_ms", started.elapsed().as_millis() as f64);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_per_minute: u32, min_delay_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests_per_minute: max_per_minute,
            min_request_delay_ms: min_delay_ms,
        }
    }

    #[tokio::test]
    async fn first_call_never_waits() {
        let table = RateLimitTable::new(&config(30, 1000));
        let start = Instant::now();
        table.acquire("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_call_within_min_delay_waits() {
        let table = RateLimitTable::new(&config(30, 50));
        table.acquire("example.com").await;
        let start = Instant::now();
        table.acquire("example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn different_hosts_do_not_share_a_bucket() {
        let table = RateLimitTable::new(&config(30, 1000));
        table.acquire("a.example.com").await;
        let start = Instant::now();
        table.acquire("b.example.com").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn window_full_forces_a_wait_until_reset() {
        let table = RateLimitTable::new(&config(1, 0));
        table.acquire("example.com").await;
        let start = Instant::now();
        // With max 1/minute and no min delay, the second call must wait for
        // the 60s window rather than sail through, proving the counter
        // (not just the min-delay) gates admission. We don't wait out a
        // full minute in a unit test; instead we assert the bucket is full
        // immediately after the first acquire.
        let bucket = table.bucket_for("example.com");
        let guard = bucket.lock().await;
        assert_eq!(guard.requests_in_window, 1);
        drop(guard);
        let _ = start.elapsed();
    }
}
