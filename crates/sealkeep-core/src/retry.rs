//! Bounded retry with backoff.
//!
//! Every retry budget in the core is finite and per operation. Exhausting a
//! budget always returns the last error; it is never a silent no-op.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay every time.
    Fixed,
    /// `delay * attempt`
    Linear,
    /// `delay * 2^(attempt - 1)`
    Exponential,
}

impl BackoffStrategy {
    /// Delay before the retry that follows failed attempt `attempt`
    /// (1-based), capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: u32, step: Duration, max_delay: Duration) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self {
            BackoffStrategy::Fixed => step,
            BackoffStrategy::Linear => step.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                step.saturating_mul(2u32.saturating_pow(attempt - 1))
            }
        };
        delay.min(max_delay)
    }
}

/// A retry budget plus its backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub step: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            step,
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Linear,
        }
    }

    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self::linear(1, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig, max_delay: Duration) -> Self {
        Self {
            max_attempts: config.max_attempts,
            step: Duration::from_millis(config.delay_ms),
            max_delay,
            strategy: config.strategy,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.strategy
            .calculate_delay(attempt, self.step, self.max_delay)
    }

    /// Upper bound on time spent sleeping if every attempt fails.
    pub fn max_total_delay(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.delay_after(a)).sum()
    }

    /// Run `operation` until it succeeds, fails with an error `retryable`
    /// rejects, or the budget is spent.
    ///
    /// `operation` receives the 1-based attempt number. `on_retry` is called
    /// with the failed attempt, the upcoming delay and the error, before
    /// sleeping.
    pub async fn run<T, E, F, Fut, P, R>(
        &self,
        mut operation: F,
        retryable: P,
        mut on_retry: R,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        R: FnMut(u32, Duration, &E),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max_attempts || !retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_after(attempt);
                    on_retry(attempt, delay, &err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
