//! Bounded retry of whole transactions on concurrency conflicts.

use std::future::Future;
use std::time::Duration;

use crate::error::{FulfillmentError, Result};

/// How often a transaction is re-run after losing a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause before the second attempt; grows linearly after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Runs `transaction` until it succeeds, fails for a non-retryable
    /// reason, or the attempts run out. Exhaustion is reported as
    /// [`FulfillmentError::Conflict`].
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut transaction: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match transaction(attempt).await {
                Err(err) if err.is_retryable() => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(operation, attempt, error = %err, "retry budget exhausted");
                        return Err(FulfillmentError::Conflict { attempts: attempt });
                    }
                    tracing::debug!(operation, attempt, error = %err, "transaction conflict, retrying");
                    metrics::counter!("order_transaction_retries_total", "operation" => operation)
                        .increment(1);
                    tokio::time::sleep(self.delay_after(attempt)).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
