//! Caller-side retry of probes.
//!
//! # Design Decisions
//! - Only transport failures are retried; an HTTP response is an answer
//! - Attempts are bounded; the last outcome is returned as-is
//! - Probes are GETs, so repeating them is always safe

use std::future::Future;

use crate::config::schema::RetryConfig;
use crate::probe::ProbeOutcome;
use crate::resilience::backoff::calculate_backoff;

/// Bounded retry policy for transport failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            config: RetryConfig {
                max_attempts: config.max_attempts.max(1),
                ..config.clone()
            },
        }
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self {
            config: RetryConfig {
                max_attempts: 1,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Run `probe` until it yields a response or attempts run out.
    /// Returns the final outcome and the number of attempts made.
    pub async fn run<F, Fut>(&self, mut probe: F) -> (ProbeOutcome, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProbeOutcome>,
    {
        let mut attempt = 1;
        loop {
            let error = match probe().await {
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => e,
                outcome => return (outcome, attempt),
            };

            let delay = calculate_backoff(attempt, &self.config);
            tracing::debug!(
                attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "Probe failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
