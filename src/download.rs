//! Remote source fetching with a bounded retry policy
//!
//! Only spreadsheet-driven jobs come through here; uploads already carry
//! their bytes.

use crate::config::FetchConfig;
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Retry ceiling and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n` units
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt` (1-based)
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// One attempt at retrieving a URL
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the body of `url`; non-success statuses are errors
    ///
    /// # Errors
    /// - Transport failures
    /// - Non-2xx responses
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: SourceFetcher + ?Sized> SourceFetcher for std::sync::Arc<T> {
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch_once(url).await
    }
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a per-request timeout
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("catalog-aligner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::fetch(url, 1, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::fetch(url, 1, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatalogError::fetch(url, 1, e))?;
        Ok(bytes.to_vec())
    }
}

/// Fetcher wrapper applying a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct FetchRetrier<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: SourceFetcher> FetchRetrier<F> {
    #[must_use]
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch with retries; the terminal error carries the last failure
    #[instrument(skip(self), fields(max_attempts = self.policy.max_attempts))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.fetcher.fetch_once(url).await {
                Ok(bytes) => {
                    debug!(attempt, bytes = bytes.len(), "Fetched source");
                    return Ok(bytes);
                },
                Err(e) => {
                    last_error = match e {
                        CatalogError::Fetch { message, .. } => message,
                        other => other.to_string(),
                    };
                    warn!(attempt, error = %last_error, "Fetch attempt failed");
                },
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        Err(CatalogError::fetch(url, max_attempts, last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` calls, then succeeds
    struct FlakyFetcher {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SourceFetcher for FlakyFetcher {
        async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(CatalogError::fetch(url, 1, format!("HTTP 503 (call {})", call)))
            } else {
                Ok(vec![0xFF, 0xD8])
            }
        }
    }

    fn flaky(failures: u32) -> (FlakyFetcher, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            FlakyFetcher {
                failures,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_second_attempt_after_backoff() {
        let (fetcher, calls) = flaky(1);
        let retrier = FetchRetrier::new(fetcher, RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let bytes = retrier.fetch("https://cdn.example.com/a.jpg").await.unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_twice_then_success_is_permanent_failure() {
        let (fetcher, calls) = flaky(2);
        let retrier = FetchRetrier::new(fetcher, RetryPolicy::default());

        let err = retrier.fetch("https://cdn.example.com/b.jpg").await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            CatalogError::Fetch {
                url,
                attempts,
                message,
            } => {
                assert_eq!(url, "https://cdn.example.com/b.jpg");
                assert_eq!(attempts, 2);
                assert!(message.contains("call 2"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_sleeps() {
        let (fetcher, calls) = flaky(5);
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_secs(60),
        };
        let started = tokio::time::Instant::now();
        let result = FetchRetrier::new(fetcher, policy).fetch("https://x/y.jpg").await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_policy_from_config() {
        let config = FetchConfig {
            max_attempts: 0,
            base_delay_ms: 250,
            request_timeout_secs: 5,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff(3), Duration::from_millis(750));
    }
}
