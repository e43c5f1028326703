//! Bounded exponential-backoff retry for I/O error kinds (spec §5 Retries
//! / §7 Propagation). Pure-function error kinds (`InvalidInput`,
//! `InternalInvariant`) and `Cancelled` are never retried — they surface
//! to the caller on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::domain::{EngineError, EngineResult};

/// Priority bucket a retried operation belongs to (§5). Higher-priority
/// callers back off less aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    fn delay_multiplier(self) -> f64 {
        match self {
            Priority::High => 0.5,
            Priority::Normal => 1.0,
            Priority::Low => 2.0,
        }
    }
}

fn backoff_delay(config: &RetryConfig, priority: Priority, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let scaled_millis = config.base_delay.as_millis() as f64 * 2f64.powi(exponent as i32) * priority.delay_multiplier();
    let capped = scaled_millis.min(config.max_delay.as_millis() as f64);
    Duration::from_millis(capped.max(0.0) as u64)
}

/// Run `op` until it succeeds, a non-retryable error surfaces, or
/// `config.max_attempts` is exhausted. `Cancelled` always short-circuits.
pub async fn retry<F, Fut, T>(config: &RetryConfig, priority: Priority, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) if !err.is_retryable() || attempt >= config.max_attempts => return Err(err),
            Err(err) => {
                tracing::warn!(attempt, error = %err, "retrying after transient store error");
                tokio::time::sleep(backoff_delay(config, priority, attempt)).await;
                attempt += 1;
            }
        }
    }
}
