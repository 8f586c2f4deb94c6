//! SQLite retry logic with exponential backoff.
//!
//! Transient SQLite errors like SQLITE_BUSY (5) and SQLITE_LOCKED (6) show up
//! under concurrent write load (view counting, counter recomputes). Wrapping
//! those writes in `with_retry` resolves them after a short backoff instead
//! of surfacing a 500.

use std::future::Future;
use std::time::Duration;

use sqlx::Error as SqlxError;

/// Configuration for SQLite retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps the exponential growth).
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0) to add randomness to delays.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 50,
            max_delay_ms: 2000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt using exponential backoff with jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.base_delay_ms * 2u64.pow(attempt);
        let capped_delay = base_delay.min(self.max_delay_ms);

        // Add jitter to prevent thundering herd
        let jitter = if self.jitter_factor > 0.0 {
            let jitter_range = (capped_delay as f64 * self.jitter_factor) as u64;
            if jitter_range > 0 {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos() as u64;
                now % jitter_range
            } else {
                0
            }
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

/// Check if an error is a transient SQLite error that should be retried.
///
/// Retryable codes: 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED, 10 = SQLITE_IOERR and
/// its extended variants (e.g. 522). IOERR variants can be transient under
/// heavy write load with WAL + mmap and often resolve after a brief pause.
pub fn is_retryable_error(e: &SqlxError) -> bool {
    if let SqlxError::Database(db_err) = e {
        if let Some(code) = db_err.code() {
            let code_str = code.as_ref();
            if matches!(code_str, "5" | "6" | "10") {
                return true;
            }
            // Extended I/O error codes have base 10: (code & 0xFF) == 10
            if let Ok(code_num) = code_str.parse::<u32>()
                && code_num > 10
                && (code_num & 0xFF) == 10
            {
                return true;
            }
        }
        false
    } else {
        false
    }
}

/// Execute a database operation with exponential backoff retry.
///
/// Retries the operation up to `config.max_retries` times when it encounters
/// a transient SQLite error; any other error is returned immediately.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, SqlxError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SqlxError>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if is_retryable_error(&e) && attempt < config.max_retries => {
                let delay = config.calculate_delay(attempt);

                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "Transient SQLite error, retrying with backoff"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = ?e,
                        "Database operation failed after all retries"
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay_ms, 50);
        assert_eq!(config.max_delay_ms, 2000);
    }

    #[test]
    fn test_calculate_delay_exponential() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.0, // No jitter for predictable testing
        };

        assert_eq!(config.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(config.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(config.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(config.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(config.calculate_delay(6), Duration::from_millis(5000)); // Capped
    }

    #[test]
    fn test_calculate_delay_with_jitter() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.2,
        };

        // With 20% jitter on 100ms base, delay should be 100-120ms
        let delay = config.calculate_delay(0);
        assert!(delay >= Duration::from_millis(100));
        assert!(delay <= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_with_retry_passes_through_success() {
        let result = with_retry(&RetryConfig::default(), "noop", || async {
            Ok::<_, SqlxError>(7)
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
    }

    #[tokio::test]
    async fn test_with_retry_propagates_non_retryable_error() {
        let result: Result<(), _> = with_retry(&RetryConfig::default(), "fails", || async {
            Err(SqlxError::RowNotFound)
        })
        .await;
        assert!(matches!(result, Err(SqlxError::RowNotFound)));
    }
}
