//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based), kept within
/// `[wait_min, wait_max]`.
///
/// The exponential step is `wait_min * 2^(attempt - 1)`; up to 10% jitter is
/// added on top and the result is clamped to `wait_max`.
pub fn calculate_backoff(attempt: u32, wait_min: Duration, wait_max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let min_ms = wait_min.as_millis() as u64;
    let max_ms = (wait_max.as_millis() as u64).max(min_ms);

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = min_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis((capped_delay + jitter).min(max_ms))
}
