//! Retry policy with exponential backoff
//!
//! A plain value: attempt bound, backoff schedule and the predicate that
//! decides which errors are worth retrying. Injected where it is used so
//! the behavior is inspectable and testable without a network.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::errors::{PipelineError, Result};

/// Default attempt bound, first try included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const DEFAULT_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_DELAY_MS: u64 = 16000;

/// Backoff settings as they appear in config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: true,
        }
    }
}

/// Result of a retried operation plus how many attempts it took
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    retryable: fn(&PipelineError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: true,
            retryable: PipelineError::is_transient,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
        .with_jitter(settings.jitter)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the retryable-error predicate
    pub fn with_predicate(mut self, retryable: fn(&PipelineError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, error: &PipelineError) -> bool {
        (self.retryable)(error)
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Retried<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.execute_observed(operation, |_, _| {}).await
    }

    /// `execute`, calling `on_retry(next_attempt, &error)` before each backoff
    ///
    /// On exhaustion the last error is returned unchanged so callers can
    /// still see what went wrong.
    pub async fn execute_observed<F, Fut, T, R>(&self, mut operation: F, mut on_retry: R) -> Retried<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
        R: FnMut(u32, &PipelineError),
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    return Retried {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    if !self.is_retryable(&e) || attempt >= self.max_attempts {
                        return Retried {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                    on_retry(attempt + 1, &e);
                    sleep(self.delay(attempt)).await;
                }
            }
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = base_ms
            .saturating_mul(2u64.pow(exponent))
            .min(self.max_delay.as_millis() as u64);

        // ±25% random variation
        let final_ms = if self.jitter {
            let jitter = (delay_ms / 4) as f64;
            let offset = (rand::random::<f64>() * 2.0 - 1.0) * jitter;
            ((delay_ms as f64) + offset).max(0.0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(final_ms)
    }

    /// Total backoff when every attempt fails, without jitter
    pub fn max_total_wait_time(&self) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let cap_ms = self.max_delay.as_millis() as u64;
        let total: u64 = (0..self.max_attempts.saturating_sub(1))
            .map(|i| base_ms.saturating_mul(2u64.pow(i.min(20))).min(cap_ms))
            .sum();
        Duration::from_millis(total)
    }
}
