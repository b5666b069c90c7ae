//! Uniform retry policy for transient failures
//!
//! Every call site that wants retries goes through the same policy:
//! exponential backoff with jitter, retrying only errors classified as
//! retryable (network transport, throttling). User rejections and contract
//! reverts surface immediately no matter how many attempts remain.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::errors::ClientError;
use crate::logger::{self, LogTag};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before the given attempt (1-based), with jitter applied
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms as f64
            * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.config.max_delay_ms as f64);

        let jitter_span = capped * self.config.jitter;
        let jitter = if jitter_span > 0.0 {
            rand::thread_rng().gen_range(-jitter_span..=jitter_span)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// Run an operation, retrying retryable failures up to max_attempts
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    // Throttled errors carry their own suggested wait
                    let delay = match &e {
                        ClientError::Throttled { retry_in_ms } => {
                            Duration::from_millis(*retry_in_ms)
                        }
                        _ => self.delay_for_attempt(attempt),
                    };
                    logger::debug(
                        LogTag::Rpc,
                        &format!(
                            "{} attempt {}/{} failed ({}), retrying in {}ms",
                            label,
                            attempt,
                            self.config.max_attempts,
                            e,
                            delay.as_millis()
                        ),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
