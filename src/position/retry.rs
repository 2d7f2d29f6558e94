use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::common::errors::ChainError;
use crate::common::traits::Clock;

/// Upper bound for a single backoff delay
const MAX_BACKOFF_MS: u64 = 30_000;

/// Bounded retry for transient chain read failures
///
/// `attempts` counts the first try, so `attempts = 1` disables retrying.
/// The delay starts at `backoff_ms` and doubles after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts,
            backoff_ms,
        }
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(
        &self,
        clock: &dyn Clock,
        label: &str,
        mut op: F,
    ) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        label, attempt, attempts, err, delay
                    );
                    clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!("{} failed after {} attempt(s): {}", label, attempt, err);
                    return Err(err);
                }
            }
        }
    }
}
