//! Bounded retries with exponential backoff and jitter.
//!
//! [`with_retry`] drives an async operation until it succeeds, fails with a
//! non-retryable [`DexError`], runs out of attempts or gets cancelled.
//! Server-provided hints (`Retry-After`) replace the computed backoff.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DexError;

/// Retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Runs `operation` with retries according to `config`.
///
/// The operation receives the 0-based attempt index. Cancellation is checked
/// before every attempt and while waiting between attempts, the operation
/// itself is expected to observe `cancel` while in flight.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, DexError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DexError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(DexError::Cancelled);
        }

        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            debug!(%err, attempt, "non-retryable failure");
            return Err(err);
        }
        if attempt + 1 >= max_attempts {
            warn!(%err, attempts = max_attempts, "retries exhausted");
            return Err(err);
        }

        let delay = backoff_delay(config, attempt, err.retry_after());
        warn!(%err, attempt, delay_ms = delay.as_millis() as u64, "attempt failed, backing off");

        tokio::select! {
            _ = cancel.cancelled() => return Err(DexError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Delay before retry number `attempt` (0 for the first retry).
///
/// A positive `hint` is used verbatim, otherwise `min(max, base * 2^attempt)`
/// is jittered uniformly into `[delay / 2, delay]`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32, hint: Option<Duration>) -> Duration {
    if let Some(hint) = hint.filter(|h| !h.is_zero()) {
        return hint;
    }
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    let delay = config
        .base_delay
        .checked_mul(factor)
        .unwrap_or(config.max_delay)
        .min(config.max_delay);
    if delay.is_zero() {
        return delay;
    }
    rand::thread_rng().gen_range(delay / 2..=delay)
}

/// Parses a `Retry-After` header value: delay seconds or an HTTP-date.
///
/// Dates in the past and unparseable values yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    (date.with_timezone(&Utc) - now).to_std().ok()
}

/// Runs `fut` until it completes, `cancel` fires or `timeout` elapses,
/// whichever comes first.
///
/// Cancellation surfaces as [`DexError::Cancelled`], the timeout as the
/// retryable [`DexError::Timeout`].
pub async fn with_deadline<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: F,
) -> Result<T, DexError>
where
    F: Future<Output = Result<T, DexError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DexError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => res.unwrap_or(Err(DexError::Timeout)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use chrono::TimeZone;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&config(3), &CancellationToken::new(), |_| async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(DexError::Transport("connection reset".to_string())),
                _ => Ok(42),
            }
        })
        .await;

        assert_eq!(assert_ok!(result), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_once() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&config(5), &CancellationToken::new(), |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DexError::Liquidity("Insufficient liquidity".to_string()))
        })
        .await;

        assert!(matches!(result, Err(DexError::Liquidity(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&config(3), &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(DexError::Api {
                    status: Some(500 + attempt as u16),
                    message: String::new(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(DexError::Api { status: Some(502), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&config(3), &cancel, |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(DexError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_backoff_wait() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let slow = RetryConfig::new(5, Duration::from_secs(60), Duration::from_secs(60));

        let task = {
            let cancel = cancel.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                with_retry(&slow, &cancel, |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(DexError::Timeout) }
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let result = task.await.unwrap();

        assert!(matches!(result, Err(DexError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delay_bounds() {
        let config = config(10);
        for attempt in 0..8 {
            let expected = (Duration::from_millis(100) * 2u32.pow(attempt)).min(Duration::from_secs(1));
            let delay = backoff_delay(&config, attempt, None);
            assert!(delay >= expected / 2 && delay <= expected, "attempt {attempt}: {delay:?}");
        }
        // Huge attempt numbers saturate at max delay.
        assert!(backoff_delay(&config, 100, None) <= Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_prefers_positive_hint() {
        let config = config(3);
        assert_eq!(
            backoff_delay(&config, 0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert!(backoff_delay(&config, 0, Some(Duration::ZERO)) <= Duration::from_millis(100));
    }

    #[test]
    fn test_parse_retry_after() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:27:00 GMT", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("-5", now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_timeout_and_cancel() {
        let never = std::future::pending::<Result<(), DexError>>;

        let res = with_deadline(&CancellationToken::new(), Duration::from_secs(1), never()).await;
        assert!(matches!(res, Err(DexError::Timeout)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = with_deadline(&cancel, Duration::from_secs(1), never()).await;
        assert!(matches!(res, Err(DexError::Cancelled)));

        let res = with_deadline(&CancellationToken::new(), Duration::from_secs(1), async {
            Ok(5)
        })
        .await;
        assert_eq!(assert_ok!(res), 5);

        assert_err!(
            with_deadline(&CancellationToken::new(), Duration::from_secs(1), async {
                Err::<(), _>(DexError::Decode("bad".to_string()))
            })
            .await
        );
    }
}
