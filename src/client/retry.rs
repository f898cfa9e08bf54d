//! Retry/backoff policy shared by the async-search controller and the
//! export pipeline.
//!
//! Only errors classified as transient ([`ElasticError::is_retryable`]) are
//! retried; everything else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{ElasticError, Result};

/// Exponential backoff with a bounded number of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            min_delay: config.min_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }

    /// Run `attempt`, re-issuing it on transient failures.
    ///
    /// # Arguments
    /// * `operation` - Name used in retry log lines
    /// * `attempt` - Produces a fresh request future for each try
    ///
    /// # Returns
    /// * `Result<T>` - First success, or the last error once the budget is spent
    pub async fn run<T, F, Fut>(&self, operation: &'static str, attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        attempt
            .retry(self.backoff())
            .sleep(tokio::time::sleep)
            .when(ElasticError::is_retryable)
            .notify(|err: &ElasticError, delay: Duration| {
                warn!(
                    operation,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            jitter: false,
        }
    }

    fn transport() -> ElasticError {
        ElasticError::Transport {
            operation: "test",
            message: "connection reset".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;

        let value = fast_policy(3)
            .run("test", move || async move {
                if calls_ref.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transport())
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_budget() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;

        let result: Result<()> = fast_policy(2)
            .run("test", move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(ElasticError::ServerBusy {
                    operation: "test",
                    status: 503,
                    message: "busy".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(ElasticError::ServerBusy { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;

        let result: Result<()> = fast_policy(5)
            .run("test", move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(ElasticError::Query {
                    operation: "test",
                    status: 400,
                    message: "parsing_exception".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(ElasticError::Query { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_tries_once() {
        let calls = AtomicUsize::new(0);
        let calls_ref = &calls;

        let result: Result<()> = RetryPolicy::none()
            .run("test", move || async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err(transport())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
