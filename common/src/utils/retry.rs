use std::{future::Future, time::Duration};

use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::warn;

use crate::error::AppError;

/// Timeout and backoff applied to every call into an external service.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: usize,
    pub backoff_factor_ms: u64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            backoff_factor_ms: 50,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Runs `action` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent. Delays grow 100ms, 200ms, 400ms... with jitter.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut action: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.backoff_factor_ms)
            .max_delay(self.max_backoff)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1));
        let timeout = self.timeout;

        RetryIf::spawn(
            strategy,
            || {
                let attempt = action();
                async move {
                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => {
                            warn!(operation, error = %err, "external call failed");
                            Err(err)
                        }
                        Err(_) => {
                            warn!(
                                operation,
                                timeout_secs = timeout.as_secs(),
                                "external call timed out"
                            );
                            Err(AppError::Upstream(format!(
                                "{operation} timed out after {}s",
                                timeout.as_secs()
                            )))
                        }
                    }
                }
            },
            AppError::is_transient,
        )
        .await
    }
}
