//! Timeout enforcement.
//!
//! # Design Decisions
//! - Per-attempt timeouts belong to the shared client; this module enforces
//!   the overall deadline of one inbound request
//! - On expiry the wrapped future is dropped, cancelling every pending
//!   outbound call and releasing every lock guard it holds
//! - Timeout errors are distinct from transport errors

use std::future::Future;
use std::time::Duration;

use crate::client::types::{GatewayError, GatewayResult};

/// Run `fut` under `deadline`, surfacing [`GatewayError::Timeout`] on expiry.
pub async fn with_deadline<T, Fut>(deadline: Duration, fut: Fut) -> GatewayResult<T>
where
    Fut: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(deadline = ?deadline, "Request deadline exceeded, cancelling in-flight work");
            Err(GatewayError::Timeout(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_pending_work() {
        let finished = Arc::new(AtomicBool::new(false));
        let f = finished.clone();
        let result: GatewayResult<()> = with_deadline(Duration::from_secs(1), async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            f.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(GatewayError::Timeout(d)) if d == Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok(5) }).await;
        assert_eq!(ok.unwrap(), 5);
        let err: GatewayResult<()> =
            with_deadline(Duration::from_secs(1), async { Err(GatewayError::Validation("x".into())) }).await;
        assert_eq!(err.unwrap_err().kind(), "validation");
    }
}
