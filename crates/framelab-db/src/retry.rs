//! Request retry for the REST store.
//!
//! Network errors, 429 and 5xx are retried with capped exponential backoff.
//! A 429 `Retry-After` hint replaces the computed delay. Other 4xx responses
//! fail on the first try.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug_span, warn, Instrument};

use crate::error::DbResult;
use crate::metrics::record_retry;

fn env_ms(name: &str, default: u64) -> Duration {
    let ms = std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(ms)
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first try
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_retries: d.max_retries,
            base_delay: env_ms("DB_RETRY_BASE_MS", 100),
            max_delay: env_ms("DB_RETRY_MAX_MS", 5000),
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// Uniform in `[base, min(base * 2^retry, max)]`.
    pub fn backoff(&self, retry: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }
        let ceiling = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        if ceiling <= self.base_delay {
            return ceiling;
        }
        let spread = (ceiling - self.base_delay).as_millis() as u64;
        self.base_delay + Duration::from_millis(jitter_ms(spread))
    }
}

/// Clock-derived jitter in `[0, spread]`.
fn jitter_ms(spread: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % (spread + 1)
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> DbResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = DbResult<T>>,
{
    let mut retry = 0;
    loop {
        let span = debug_span!("db_try", operation, try_number = retry + 1);
        let err = match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() || retry >= config.max_retries {
            return Err(err);
        }

        let hint = err.retry_after_ms().map(Duration::from_millis);
        let delay = config.backoff(retry, hint);
        warn!(
            operation,
            retry = retry + 1,
            delay_ms = delay.as_millis() as u64,
            "Store request failed, retrying: {}",
            err
        );
        record_retry(operation);

        tokio::time::sleep(delay).await;
        retry += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_bounds() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
        };
        for retry in 0..10 {
            let delay = config.backoff(retry, None);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_backoff_uses_capped_hint() {
        let config = RetryConfig::default();
        assert_eq!(
            config.backoff(0, Some(Duration::from_millis(700))),
            Duration::from_millis(700)
        );
        assert_eq!(
            config.backoff(0, Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DbError::ServerError(503, "unavailable".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::ServerError(502, "bad gateway".into()))
        })
        .await;

        assert!(matches!(result, Err(DbError::ServerError(502, _))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: DbResult<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::request_failed("bad filter"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
