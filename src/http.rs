//! Retry-wrapped HTTP client for upstream GET fetches.
//!
//! This module provides an async client with connection pooling, genuine
//! bounded retry with exponential backoff, and typed errors so callers can
//! tell a retryable outage from bad upstream data.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Config;

/// Base delay for exponential backoff (in milliseconds).
const BASE_BACKOFF_MS: u64 = 500;

/// Maximum delay between retries (in milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Errors that can occur during HTTP client operations.
#[derive(Debug, Error)]
pub enum HttpError {
    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// Server returned an error status code
    #[error("server error ({code}): {message}")]
    Status { code: StatusCode, message: String },

    /// Failed to parse the response body as JSON
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// All attempts exhausted
    #[error("all {attempts} attempts failed, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Client could not be constructed
    #[error("client configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::Request(err)
        }
    }
}

/// Build the pooled HTTP client shared by every outbound call in a process.
///
/// Every request carries the given timeout; a call exceeding it fails
/// instead of hanging the pipeline.
pub fn build_client(timeout: Duration) -> Result<Client, HttpError> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .map_err(|e| HttpError::Config(e.to_string()))
}

/// HTTP client wrapping GET fetches in bounded retry.
///
/// A failed fetch is retried up to `max_retries` times after the initial
/// attempt. Transient failures (connect errors, timeouts, 5xx, 429) are
/// retried after an exponential backoff with jitter; anything else fails
/// immediately.
#[derive(Clone)]
pub struct RetryClient {
    /// The underlying HTTP client (reused for connection pooling)
    client: Client,

    /// Request timeout duration
    timeout: Duration,

    /// Maximum number of retry attempts after the initial try
    max_retries: u32,
}

impl RetryClient {
    /// Create a new retry client from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Config` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, HttpError> {
        let client = build_client(config.request_timeout)?;
        Ok(Self::from_client(
            client,
            config.request_timeout,
            config.max_retries,
        ))
    }

    /// Wrap an existing client. Useful for tests and for sharing one
    /// connection pool across pipeline components.
    pub fn from_client(client: Client, timeout: Duration, max_retries: u32) -> Self {
        Self {
            client,
            timeout,
            max_retries,
        }
    }

    /// Get a clone of the underlying pooled client.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the request timeout duration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET a URL and parse the response body as JSON, retrying transient
    /// failures until the retry budget is spent.
    ///
    /// `query` entries are appended as query parameters; pass an empty slice
    /// for none. Success requires a 2xx status and a parseable JSON body.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error encountered, or
    /// `HttpError::RetriesExhausted` once every attempt has failed.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, HttpError> {
        let mut last_error: Option<HttpError> = None;
        let mut attempt = 0;

        while attempt <= self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    url = %url,
                    attempt,
                    max_retries = self.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_get(url, query).await {
                Ok(payload) => {
                    debug!(url = %url, attempts = attempt + 1, "GET fetch succeeded");
                    return Ok(payload);
                }
                Err(e) if is_retryable(&e) => {
                    warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "request failed, will retry"
                    );
                    last_error = Some(e);
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        url = %url,
                        error = %e,
                        attempts = attempt + 1,
                        "request failed permanently"
                    );
                    return Err(e);
                }
            }
        }

        // Retry budget spent; every attempt failed with a transient error.
        let last_error_msg = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        error!(
            url = %url,
            attempts = self.max_retries + 1,
            last_error = %last_error_msg,
            "all attempts failed"
        );

        Err(HttpError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error: last_error_msg,
        })
    }

    /// Send a single GET request without retry logic.
    async fn send_get(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, HttpError> {
        let mut request = self.client.get(url).timeout(self.timeout);
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| HttpError::Parse(e.to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());

            Err(HttpError::Status {
                code: status,
                message,
            })
        }
    }
}

/// Calculate the backoff delay for a given retry.
///
/// Uses exponential backoff with jitter:
/// delay = min(base * 2^retry + jitter, max_delay)
fn backoff_delay(retry: u32) -> Duration {
    let exponential = BASE_BACKOFF_MS.saturating_mul(1 << retry.min(10));

    // Up to 25% of the delay
    let jitter = rand::random::<u64>() % (exponential / 4 + 1);

    let total = exponential.saturating_add(jitter).min(MAX_BACKOFF_MS);

    Duration::from_millis(total)
}

/// Check if an error is worth retrying.
///
/// Retryable: connection errors, timeouts, 5xx, 429. Non-retryable: other
/// 4xx (the request itself is wrong), parse failures (the endpoint is not
/// speaking JSON), configuration errors.
fn is_retryable(error: &HttpError) -> bool {
    match error {
        HttpError::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
        HttpError::Timeout => true,
        HttpError::Status { code, .. } => {
            code.is_server_error() || *code == StatusCode::TOO_MANY_REQUESTS
        }
        HttpError::Parse(_) => false,
        HttpError::RetriesExhausted { .. } => false,
        HttpError::Config(_) => false,
    }
}
