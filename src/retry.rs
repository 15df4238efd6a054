//! Retry Mechanism Module
//!
//! Bounded retries with jitter. The pipeline only uses this for image uploads;
//! inference calls are billable and are never retried.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::cancel::CancelHandle;
use crate::error::PipelineError;

/// Upper bound on upload attempts: the first one plus a single retry
pub const UPLOAD_MAX_ATTEMPTS: u32 = 2;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier (for exponential backoff)
    pub backoff_multiplier: f64,
    /// Maximum jitter percentage (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::upload()
    }
}

impl RetryPolicy {
    /// One retry, only for transient failures.
    pub fn upload() -> Self {
        Self {
            max_attempts: UPLOAD_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }

    /// Set the delay before the first retry
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set jitter factor, clamped to 0.0..=1.0
    pub const fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Whether `error` is eligible for another attempt
    pub fn should_retry(&self, error: &PipelineError) -> bool {
        error.is_transient()
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(base_delay as u64).min(self.max_delay);
        self.add_jitter(delay)
    }

    fn add_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let jitter_range = delay.as_millis() as f64 * self.jitter_factor;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
    }
}

/// Retry executor that handles the actual retry logic
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: Option<CancelHandle>,
}

impl RetryExecutor {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Abort the backoff wait as soon as `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    /// `on_retry` is called with the failed attempt number before each retry.
    pub async fn execute<F, Fut, T, R>(
        &self,
        mut operation: F,
        mut on_retry: R,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
        R: FnMut(u32, &PipelineError),
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= attempts || !self.policy.should_retry(&error) {
                        return Err(error);
                    }
                    on_retry(attempt, &error);
                    let delay = self.policy.calculate_delay(attempt - 1);
                    match &self.cancel {
                        Some(cancel) => {
                            cancel
                                .guard(async {
                                    sleep(delay).await;
                                    Ok(())
                                })
                                .await?
                        }
                        None => sleep(delay).await,
                    }
                }
            }
        }
    }
}
