use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Bounded retry applied to every repository call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    /// Attempt `n` (1-based) waits `n * backoff` before the next try.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(25),
            backoff: Duration::from_secs(1),
        }
    }
}

pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: &str, mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = StoreError::Transient(format!("{op}: no attempt made"));

    for attempt in 1..=attempts {
        match timeout(policy.timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                let error = StoreError::from(e);
                if !error.is_transient() {
                    return Err(error);
                }
                last_error = error;
            }
            Err(_) => {
                last_error =
                    StoreError::Transient(format!("{op} timed out after {:?}", policy.timeout));
            }
        }

        if attempt < attempts {
            warn!(op, attempt, error = %last_error, "retrying vote store call");
            sleep(policy.backoff * attempt).await;
        }
    }

    Err(last_error)
}
