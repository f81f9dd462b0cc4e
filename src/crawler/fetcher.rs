//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch sitemap and page content
//! - Bounded exponential-backoff retry for transient failures
//!
//! A fetch never returns an error: once the retries are used up the caller gets
//! `FetchResult::Exhausted` and decides what to do with it.

use crate::config::{FetcherConfig, UserAgentConfig};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The server answered with a non-2xx status
    #[error("HTTP {0}")]
    Status(u16),

    /// The request never produced a usable response
    #[error("{0}")]
    Network(String),
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the document
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Response body
        body: String,
    },

    /// Every attempt failed
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Failure of the last attempt
        last_error: AttemptError,
    },
}

/// Bounded exponential backoff: `backoff_base * 2^attempt`, no jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts per URL
    pub max_retries: u32,
    /// Delay after the first failed attempt
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base())
    }

    /// Delay to wait after failed attempt number `attempt` (starting at 0)
    ///
    /// # Example
    ///
    /// ```
    /// use crossword_harvest::crawler::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(10, Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// The sleeps between attempts, in order
    ///
    /// One fewer than `max_retries`: nothing is slept after the last attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries.saturating_sub(1)).map(|attempt| self.delay_for(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Total timeout for a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL, retrying transient failures with exponential backoff
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return `Success` |
/// | Any other status | Retry |
/// | Timeout / connection / body error | Retry |
///
/// At most `policy.max_retries` attempts are made (at least one). After failed
/// attempt `n` (from 0) the fetcher sleeps `policy.delay_for(n)` before trying
/// again; there is no sleep after the final attempt.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `policy` - Retry bounds
pub async fn fetch_with_backoff(client: &Client, url: &str, policy: &RetryPolicy) -> FetchResult {
    let mut delays = policy.delays();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let error = match fetch_once(client, url).await {
            Ok((final_url, status_code, body)) => {
                tracing::debug!("Fetched {} (HTTP {}, attempt {})", url, status_code, attempt);
                return FetchResult::Success {
                    final_url,
                    status_code,
                    body,
                };
            }
            Err(error) => error,
        };

        match delays.next() {
            Some(delay) => {
                tracing::warn!(
                    "Attempt {} for {} failed: {}. Retrying in {:?}",
                    attempt,
                    url,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                tracing::warn!("Failed to fetch {} after {} attempts: {}", url, attempt, error);
                return FetchResult::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }
        }
    }
}

/// Performs one GET request
async fn fetch_once(client: &Client, url: &str) -> Result<(String, u16, String), AttemptError> {
    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(AttemptError::Status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    let body = response.text().await.map_err(classify_error)?;

    Ok((final_url, status.as_u16(), body))
}

fn classify_error(e: reqwest::Error) -> AttemptError {
    if e.is_timeout() {
        AttemptError::Network("Request timeout".to_string())
    } else if e.is_connect() {
        AttemptError::Network("Connection refused".to_string())
    } else {
        AttemptError::Network(e.to_string())
    }
}
