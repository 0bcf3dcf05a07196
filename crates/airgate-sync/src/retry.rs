//! Bounded fixed-delay retry, used by session construction.
//!
//! The scheduler loops do NOT use this: their retry is the loop itself, with
//! outcome-specific delays. This helper is for one-shot operations that get
//! a small, fixed number of attempts and then give up for real.

use std::time::Duration;

use tracing::debug;

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Fixed delay between a bounded number of attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Runs `operation` until it succeeds or the attempt budget is spent,
/// returning the last error on exhaustion.
pub async fn retry<T, E, F>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: AsyncFnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                debug!(attempt, max = policy.max_attempts, %err, "Attempt failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            retry(RetryPolicy::fixed(3, Duration::from_millis(100)), async || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_budget_spent() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            retry(RetryPolicy::fixed(2, Duration::from_millis(10)), async || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n}"))
            })
            .await;

        assert_eq!(result, Err("attempt 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
