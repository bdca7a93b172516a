//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tandem_core::CancellationToken;
use tandem_core::error::ProviderError;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Sent to `on_retry` before the backoff sleep starts.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: ProviderError,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. The backoff sleep ends early on cancellation.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_retry: impl FnMut(&RetryEvent),
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }

        attempt += 1;
        let delay = policy.delay_for(attempt);
        warn!(
            attempt,
            max_retries = policy.max_retries,
            status = ?err.status(),
            delay_ms = delay.as_millis() as u64,
            "Provider call failed, retrying"
        );
        on_retry(&RetryEvent {
            attempt,
            max_retries: policy.max_retries,
            delay,
            error: err,
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn http(status: u16) -> ProviderError {
        ProviderError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let mut events = Vec::new();
        let started = Instant::now();

        let result: Result<(), _> = with_retry(
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |e| events.push((e.attempt, e.delay)),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(http(529)) }
            },
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Http { status: 529, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            events,
            vec![
                (1, Duration::from_millis(1000)),
                (2, Duration::from_millis(2000)),
                (3, Duration::from_millis(4000)),
            ]
        );
        assert!(started.elapsed() >= Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |_| panic!("no retry expected"),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Network("connection refused".into())) }
            },
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let started = Instant::now();

        let result: Result<(), _> = with_retry(
            &RetryPolicy::default(),
            &cancel,
            |_| trigger.cancel(),
            || async { Err(http(503)) },
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Cancelled)));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }
}
