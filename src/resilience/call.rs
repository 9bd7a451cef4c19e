//! Breaker-guarded, retrying call composition.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::client::types::{GatewayError, GatewayResult, PartitionKey};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::retries::RetryingInvoker;

/// Composes a [`CircuitBreaker`] and a [`RetryingInvoker`] around a call factory.
///
/// Breaker health tracks connectivity, not business outcome: any received
/// response, including a [`GatewayError::Remote`], counts as a success.
#[derive(Debug, Clone)]
pub struct ResilientCall {
    breaker: Arc<CircuitBreaker>,
    invoker: RetryingInvoker,
}

impl ResilientCall {
    pub fn new(breaker: Arc<CircuitBreaker>, invoker: RetryingInvoker) -> Self {
        Self { breaker, invoker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run `factory` unless the breaker for `partition` is open.
    pub async fn call<T, F, Fut>(
        &self,
        operation_key: &str,
        partition: &PartitionKey,
        factory: F,
    ) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let start = Instant::now();

        if self.breaker.is_open(partition) {
            tracing::warn!(
                breaker = %self.breaker.name(),
                operation = %operation_key,
                partition = %partition,
                "Circuit open, call rejected without network I/O"
            );
            metrics::record_upstream_call(operation_key, "breaker_open", start);
            return Err(GatewayError::BreakerOpen {
                breaker: self.breaker.name().to_string(),
                partition: partition.to_string(),
            });
        }

        let result = self.invoker.invoke(operation_key, factory).await;

        let outcome = match &result {
            Ok(_) => {
                self.breaker.record_success(partition);
                "ok"
            }
            Err(GatewayError::Remote { .. }) => {
                self.breaker.record_success(partition);
                "remote_error"
            }
            Err(err) if err.is_transport() => {
                self.breaker.record_failure(partition);
                "transport_error"
            }
            Err(_) => "error",
        };
        metrics::record_upstream_call(operation_key, outcome, start);

        result
    }
}
