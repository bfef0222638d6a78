//! Request throttling for E-utilities
//!
//! NCBI allows 3 requests per second per IP without an API key and 10 with
//! one. Exceeding the budget yields HTTP 429 and, when repeated, a temporary
//! block. [`RateLimiter`] is a token bucket shared between clones, so every
//! handle to the same transport draws from one budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::error::Result;

/// Token bucket rate limiter
#[derive(Clone, Debug)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` requests per second
    ///
    /// The bucket starts full, holding `max(rate, 1)` tokens, so a short burst
    /// goes out immediately.
    ///
    /// # Example
    ///
    /// ```
    /// use eutils_session::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(3.0);
    /// ```
    pub fn new(rate: f64) -> Self {
        let refill_rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        let capacity = refill_rate.max(1.0);
        Self {
            bucket: Arc::new(Mutex::new(TokenBucket {
                tokens: capacity,
                capacity,
                refill_rate,
                last_refill: Instant::now(),
            })),
        }
    }

    /// NCBI budget without an API key (3 requests/second)
    pub fn ncbi_default() -> Self {
        Self::new(3.0)
    }

    /// NCBI budget with an API key (10 requests/second)
    pub fn ncbi_with_key() -> Self {
        Self::new(10.0)
    }

    /// Take one token, sleeping until one is available
    ///
    /// Clones waiting on the same bucket may take a refilled token first;
    /// the loser goes back to sleep rather than failing.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<()> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill();

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    debug!(remaining_tokens = %bucket.tokens, "Token acquired");
                    return Ok(());
                }

                bucket.time_until_token()
            };

            debug!(wait_ms = wait.as_millis() as u64, "Waiting for rate limit token");
            sleep(wait).await;
        }
    }

    /// Whether a token could be taken right now, without taking it
    pub async fn check_available(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens >= 1.0
    }

    /// Tokens currently in the bucket
    pub async fn token_count(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        bucket.tokens
    }

    /// Configured requests per second
    pub async fn rate(&self) -> f64 {
        self.bucket.lock().await.refill_rate
    }
}

impl TokenBucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn time_until_token(&self) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing / self.refill_rate).max(Duration::from_millis(1))
    }
}
