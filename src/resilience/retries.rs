//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is retryable (transport failures only)
//! - Execute retries with exponential backoff + jitter
//!
//! # Design Decisions
//! - Any received response ends the loop, whatever its status
//! - Only used on the read path; writes go through the bypass
//! - Jittered backoff prevents thundering herd

use std::future::Future;
use std::time::Duration;

use crate::client::types::{GatewayError, GatewayResult};
use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Whether an attempt that failed with `err` may be repeated.
pub fn is_retryable(err: &GatewayError) -> bool {
    err.is_transport()
}

/// Runs one logical call with bounded retry on transport failures.
#[derive(Debug, Clone)]
pub struct RetryingInvoker {
    max_attempts: u32,
    wait_min: Duration,
    wait_max: Duration,
}

impl RetryingInvoker {
    /// `max_attempts = 1` disables retry; 0 is treated as 1.
    pub fn new(max_attempts: u32, wait_min: Duration, wait_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            wait_min,
            wait_max,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.wait_min(), config.wait_max())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Invoke `factory` until it yields anything other than a transport
    /// failure, or attempts run out. Returns the last transport failure on
    /// exhaustion.
    pub async fn invoke<T, F, Fut>(&self, operation: &str, mut factory: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match factory().await {
                Err(err) if is_retryable(&err) && attempt < self.max_attempts => {
                    let delay = calculate_backoff(attempt, self.wait_min, self.wait_max);
                    tracing::warn!(
                        operation = %operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay = ?delay,
                        error = %err,
                        "Transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if is_retryable(&err) {
                        tracing::warn!(
                            operation = %operation,
                            attempts = attempt,
                            error = %err,
                            "Retries exhausted"
                        );
                    }
                    return Err(err);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::TransportKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transport() -> GatewayError {
        GatewayError::Transport {
            operation: "op".into(),
            kind: TransportKind::Connect,
            message: "connection refused".into(),
        }
    }

    fn invoker(max_attempts: u32) -> RetryingInvoker {
        RetryingInvoker::new(max_attempts, Duration::from_millis(100), Duration::from_millis(400))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transport_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = invoker(3)
            .invoke("op", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transport())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_transport_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: GatewayResult<()> = invoker(2)
            .invoke("op", move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(transport()) }
            })
            .await;
        assert!(result.unwrap_err().is_transport());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remote_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: GatewayResult<()> = invoker(5)
            .invoke("op", move || {
                c.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(GatewayError::Remote {
                        operation: "op".into(),
                        status: 500,
                        message: "boom".into(),
                    })
                }
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), "remote");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_disables_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let _ = invoker(1)
            .invoke("op", move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transport()) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(RetryingInvoker::new(0, Duration::ZERO, Duration::ZERO).max_attempts(), 1);
    }
}
