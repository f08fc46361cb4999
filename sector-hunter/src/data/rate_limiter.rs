//! Token bucket rate limiter for upstream request throttling.
//!
//! The constituent fan-out issues up to ten board requests at once and the
//! snapshot pages through the whole market, so every upstream call takes a
//! token from one shared bucket.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket rate limiter.
///
/// Holds at most one second worth of requests and refills continuously at
/// `requests_per_minute / 60` tokens per second.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
    name: String,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` requests.
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        let refill_per_sec = f64::from(requests_per_minute.max(1)) / 60.0;
        let capacity = refill_per_sec.ceil().max(1.0);

        Self {
            capacity,
            refill_per_sec,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            name: name.into(),
        }
    }

    /// Acquire a token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_take() {
                Ok(()) => return,
                Err(wait) => wait,
            };

            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for token"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.try_take().is_ok()
    }

    /// Tokens currently available.
    pub fn available_tokens(&self) -> f64 {
        match self.bucket.lock() {
            Ok(mut bucket) => {
                self.refill(&mut bucket);
                bucket.tokens
            }
            Err(_) => 0.0,
        }
    }

    /// Bucket capacity in tokens.
    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// On failure returns how long until the next whole token.
    fn try_take(&self) -> Result<(), Duration> {
        let Ok(mut bucket) = self.bucket.lock() else {
            // Poisoned by a panicking holder; do not throttle forever
            return Ok(());
        };
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let missing = 1.0 - bucket.tokens;
        let secs = missing / self.refill_per_sec;
        Err(Duration::from_secs_f64(secs).clamp(Duration::from_millis(10), Duration::from_secs(5)))
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            bucket.last_refill = now;
        }
    }
}

/// Shared rate limiter that can be cloned.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared rate limiter.
pub fn shared_limiter(name: impl Into<String>, requests_per_minute: u32) -> SharedRateLimiter {
    Arc::new(RateLimiter::new(name, requests_per_minute))
}

// ============================================================================
// Tests
// ============================================================================
