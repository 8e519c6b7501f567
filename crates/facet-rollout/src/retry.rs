//! Retry policy for state-changing router calls
//!
//! Batches are few and each one is an on-chain transaction, so the default is
//! a fixed delay between attempts. Exponential backoff with jitter can be
//! selected without changing what callers observe: a call either succeeds
//! within `max_retries + 1` attempts or reports its last error.
//!
//! Only errors that report themselves as retryable are retried; a revert is
//! returned on the first attempt.

use crate::errors::RouterError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Errors the retry loop can classify and synthesize on timeout
pub trait RetryableError: Sized {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool;

    /// Error representing an attempt that exceeded its timeout
    fn timed_out(after: Duration) -> Self;
}

impl RetryableError for RouterError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn timed_out(after: Duration) -> Self {
        RouterError::Timeout {
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Backoff strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// delay * 2^attempt
    Exponential,
    /// Exponential plus up to 10% random jitter
    ExponentialWithJitter,
}

impl BackoffStrategy {
    /// Delay before retry number `attempt` (0 = first retry)
    pub fn calculate_delay(
        &self,
        attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        use rand::Rng;

        let doubled = initial_delay.saturating_mul(2u32.saturating_pow(attempt));
        let delay = match self {
            BackoffStrategy::Fixed => initial_delay,
            BackoffStrategy::Exponential => doubled,
            BackoffStrategy::ExponentialWithJitter => {
                let factor = 0.1 * rand::thread_rng().gen::<f64>();
                let jitter = (doubled.as_millis() as f64 * factor) as u64;
                doubled.saturating_add(Duration::from_millis(jitter))
            }
        };

        delay.min(max_delay)
    }
}

/// Retry configuration for one kind of call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any delay
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
    /// Bound on each individual attempt
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Fixed delay between attempts
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            attempt_timeout: None,
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Set the backoff strategy and its ceiling
    pub fn with_strategy(mut self, strategy: BackoffStrategy, max_delay: Duration) -> Self {
        self.strategy = strategy;
        self.max_delay = max_delay.max(self.initial_delay);
        self
    }

    /// Bound each attempt
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay before retry number `attempt`
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.strategy
            .calculate_delay(attempt, self.initial_delay, self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently or the budget is spent
    pub async fn execute_with_context<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        let mut total_delay = Duration::ZERO;
        let mut failures = Vec::new();

        loop {
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(E::timed_out(limit)),
                },
                None => operation().await,
            };

            match outcome {
                Ok(value) => {
                    return RetryResult {
                        result: Ok(value),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                        total_retry_delay: total_delay,
                        failures,
                    };
                }
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.max_retries {
                        return RetryResult {
                            result: Err(err),
                            attempts: attempt + 1,
                            total_duration: start.elapsed(),
                            total_retry_delay: total_delay,
                            failures,
                        };
                    }

                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_retries.saturating_add(1),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    failures.push(err.to_string());
                    total_delay = total_delay.saturating_add(delay);
                    tokio::time::sleep(delay).await;

                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

/// Result of a retried operation with statistics
#[derive(Debug, Clone)]
pub struct RetryResult<T, E> {
    /// Final result (success or last failure)
    pub result: Result<T, E>,
    /// Number of attempts made
    pub attempts: u32,
    /// Total duration including retries
    pub total_duration: Duration,
    /// Total time spent waiting between attempts
    pub total_retry_delay: Duration,
    /// Messages of the failed attempts that were retried
    pub failures: Vec<String>,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Number of retries performed
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Get the result
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Convert the error, keeping the statistics
    pub fn map_err<F>(self, op: impl FnOnce(E) -> F) -> RetryResult<T, F> {
        RetryResult {
            result: self.result.map_err(op),
            attempts: self.attempts,
            total_duration: self.total_duration,
            total_retry_delay: self.total_retry_delay,
            failures: self.failures,
        }
    }
}
