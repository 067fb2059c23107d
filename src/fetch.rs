//! HTTP GET with bounded retry on transient failures.

use crate::error::SyncError;
use crate::types::SyncConfig;
use std::future::Future;
use std::time::Duration;
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// A response whose body has been read completely.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: reqwest::StatusCode,
    pub body: Vec<u8>,
}

impl BufferedResponse {
    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues GET requests, retrying transient failures with a fixed pause.
///
/// Every call makes at most `max_attempts` attempts. Success is returned as
/// soon as an attempt succeeds; after the last failed attempt its error is
/// returned to the caller.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: usize,
    retry_delay: Duration,
    request_timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(concat!("yadsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay,
            request_timeout: config.request_timeout,
        })
    }

    /// Fetches `url` and reads the whole body.
    ///
    /// The status is not checked: error payloads are returned like any other
    /// body so the caller can inspect them.
    pub async fn fetch_buffered(&self, url: &str) -> Result<BufferedResponse, SyncError> {
        self.with_retry(url, || async move {
            let response = self
                .client
                .get(url)
                .timeout(self.request_timeout)
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<_, SyncError>(BufferedResponse { status, body })
        })
        .await
    }

    /// Fetches `url` and returns as soon as the headers arrive.
    ///
    /// The body is left unread for the caller to consume incrementally.
    /// Non-success statuses are errors (5xx ones are retried).
    pub async fn fetch_streamed(&self, url: &str) -> Result<reqwest::Response, SyncError> {
        self.with_retry(url, || async move {
            let response = tokio::time::timeout(self.request_timeout, self.client.get(url).send())
                .await
                .map_err(|_| SyncError::Timeout {
                    url: url.to_string(),
                    timeout: self.request_timeout,
                })??;

            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::HttpStatus {
                    url: url.to_string(),
                    status,
                });
            }
            Ok::<_, SyncError>(response)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let retry_strategy = FixedInterval::from_millis(self.retry_delay.as_millis() as u64)
            .take(self.max_attempts - 1);
        let max_attempts = self.max_attempts;
        let mut attempt = 0usize;

        Retry::spawn(retry_strategy, || {
            attempt += 1;
            let current = attempt;
            let pending = op();

            async move {
                match pending.await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_transient() => {
                        warn!(
                            "Attempt {}/{} for {} failed: {}",
                            current, max_attempts, url, e
                        );
                        RetryError::to_transient(e)
                    }
                    Err(e) => {
                        debug!("Not retrying {}: {}", url, e);
                        RetryError::to_permanent(e)
                    }
                }
            }
        })
        .await
    }
}
