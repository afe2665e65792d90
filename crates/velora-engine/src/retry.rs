//! Retry with exponential backoff for provider calls.
//!
//! Only transient errors are retried. The delay doubles per attempt up to a
//! cap, is spread by a random jitter factor and never undercuts a
//! provider-supplied `retry_after`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use velora_config::RetrySettings;
use velora_topology::ProviderError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Fraction of the delay randomly added or removed (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
            jitter: settings.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Delay to wait before retrying after `error`.
    pub fn delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        let base = self.backoff(attempt);
        let factor = 1.0 - self.jitter + fastrand::f64() * 2.0 * self.jitter;
        let delay = base.mul_f64(factor.max(0.0)).min(self.max_backoff);
        match error.retry_after() {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, runs out of attempts or
    /// `cancel` fires during a backoff wait.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay(attempt, &err);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider error, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(err),
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(operation, attempts = attempt, error = %err, "Retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}
