//! Retry policy for transient transport failures
//!
//! Requests against E-utilities fail transiently more often than one would
//! like (502/503 from the load balancer, 429 when the per-IP budget is spent,
//! dropped connections). [`with_retry`] reruns an operation with exponential
//! backoff while the error it returns reports itself as retryable.

use std::future::Future;
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::jitter;
use tracing::{debug, warn};

/// Errors that know whether repeating the request could succeed
pub trait RetryableError {
    /// Whether the failed operation may succeed if attempted again
    fn is_retryable(&self) -> bool;

    /// Short human readable classification, used in log output
    fn retry_reason(&self) -> &str;
}

/// Backoff settings for retried requests
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Factor applied to the delay after each retry
    pub backoff_multiplier: f64,
    /// Randomize delays so that parallel clients do not retry in lockstep
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable retries entirely
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delays between attempts, one per retry
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(move |attempt| {
            let secs = self.initial_delay.as_secs_f64()
                * self.backoff_multiplier.max(1.0).powi(attempt as i32);
            let delay = if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
                Duration::from_secs_f64(secs)
            } else {
                self.max_delay
            };
            if self.use_jitter { jitter(delay) } else { delay }
        })
    }
}

/// Run `operation`, retrying retryable failures according to `config`
///
/// Non-retryable errors are returned immediately. Once the retries are
/// exhausted the last error is returned.
pub async fn with_retry<F, Fut, T, E>(operation: F, config: &RetryConfig, name: &str) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let delays: Vec<Duration> = config.delays().collect();
    let mut attempt = 0u32;

    let result = RetryIf::spawn(delays, operation, |err: &E| {
        attempt += 1;
        if !err.is_retryable() {
            debug!(operation = name, error = %err, "Error is not retryable");
            return false;
        }
        if attempt > config.max_retries {
            return false;
        }
        warn!(
            operation = name,
            attempt = attempt,
            max_retries = config.max_retries,
            reason = err.retry_reason(),
            error = %err,
            "Retrying after transient error"
        );
        true
    })
    .await;

    if let Err(err) = &result {
        if err.is_retryable() && config.max_retries > 0 {
            warn!(operation = name, error = %err, "Giving up after retries");
        }
    }

    result
}
