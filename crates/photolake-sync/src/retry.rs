//! Retry with exponential backoff
//!
//! Storage calls made by pipeline jobs are retried only when the provider
//! reports a connection failure. Every other error, including `NotExist`,
//! is returned on the first attempt. Cancellation interrupts a pending
//! backoff and returns the last failure.

use std::future::Future;
use std::time::Duration;

use photolake_core::config::PipelineConfig;
use photolake_core::ports::StorageError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Backoff schedule for transient storage failures
///
/// Delay before retry `n` (0-based) is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that makes exactly one attempt
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `f` until it succeeds, fails permanently, or retries run out
    ///
    /// A cancelled `cancel` token ends the wait between attempts early; the
    /// error of the last attempt is returned without calling `f` again.
    pub async fn run<F, Fut, T>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut f: F,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "storage call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "connection failure, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!(operation, attempt, "retry abandoned on cancellation");
                            return Err(err);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_connection_failures_until_success() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("upload", &CancellationToken::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StorageError::BadConnection("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("download", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StorageError::BadConnection("offline".into())) }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("remove", &CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StorageError::NotExist("x.jpg".into())) }
            })
            .await;

        assert!(result.unwrap_err().is_not_exist());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let policy = RetryPolicy::new(5, Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy
            .run("upload", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StorageError::BadConnection("offline".into())) }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_the_wait() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("download", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StorageError::BadConnection("offline".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
