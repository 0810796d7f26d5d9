//! Retry execution for idempotent remote operations.

use crate::config::RetryPolicy;
use crate::error::SyncResult;
use tracing::{debug, warn};

/// Runs an idempotent operation with capped exponential backoff.
///
/// Every error is treated as retryable: the operations fed through here are
/// upserts and reads whose re-execution is harmless by contract. On
/// exhaustion the executor returns `None` and logs the final cause — it
/// never propagates the error to its caller.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates an executor with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `op`, retrying on failure per the policy.
    ///
    /// `name` labels the operation in logs. Returns `Some(result)` on the
    /// first success, `None` once all attempts are spent.
    pub fn execute<T>(&self, name: &str, mut op: impl FnMut() -> SyncResult<T>) -> Option<T> {
        let attempts = self.policy.max_retries + 1;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.delay_for_attempt(attempt);
                debug!(operation = name, attempt, ?delay, "backing off before retry");
                std::thread::sleep(delay);
            }

            match op() {
                Ok(value) => return Some(value),
                Err(error) => {
                    warn!(
                        operation = name,
                        attempt = attempt + 1,
                        attempts,
                        %error,
                        "attempt failed"
                    );
                }
            }
        }

        warn!(operation = name, attempts, "giving up after exhausting retries");
        None
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
