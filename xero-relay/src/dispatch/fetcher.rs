//! Upstream resource fetching.
//!
//! Each mapped event triggers one authenticated GET against the Xero API.
//! Transient failures (5xx, 429, timeouts, connection errors) are retried a
//! bounded number of times with jittered exponential backoff; other client
//! errors are returned immediately.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{header, Client};
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;

/// Longest upstream error body kept in a `FetchError`.
const MAX_ERROR_BODY: usize = 500;

/// Why a resource could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid resource url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("response was not valid JSON: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::InvalidUrl { .. } | FetchError::Decode(_) => false,
        }
    }

    /// Upstream HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Retrieves the current state of a resource referenced by an event.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, resource_url: &str, access_token: &str) -> Result<Value, FetchError>;
}

/// Attempt budget and backoff bounds for upstream fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: (u64, u64)) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base: Duration::from_millis(backoff_ms.0),
            cap: Duration::from_millis(backoff_ms.1),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(1, (0, 0))
    }

    /// Delay before retry number `retry` (1-based), jittered into the upper
    /// half of the exponential step.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        let step = (self.base.as_millis() as u64)
            .saturating_mul(factor)
            .min(self.cap.as_millis() as u64);

        if step == 0 {
            return Duration::ZERO;
        }

        let jittered = rand::thread_rng().gen_range(step / 2..=step);
        Duration::from_millis(jittered)
    }
}

/// Fetches resources from the Xero API over HTTP.
#[derive(Clone)]
pub struct HttpResourceFetcher {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpResourceFetcher {
    pub fn new(client: Client, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client,
            timeout,
            retry,
        }
    }

    /// Build a fetcher with a pooled client and the configured limits.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().pool_max_idle_per_host(16).build()?;

        Ok(Self::new(
            client,
            config.fetch_timeout(),
            RetryPolicy::new(config.fetch_max_attempts, config.fetch_backoff_ms),
        ))
    }

    async fn fetch_once(&self, url: &Url, access_token: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: truncate(&body, MAX_ERROR_BODY),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Decode(e.to_string())
            }
        })
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, resource_url: &str, access_token: &str) -> Result<Value, FetchError> {
        let url = parse_resource_url(resource_url)?;

        let mut attempt = 1;
        loop {
            match self.fetch_once(&url, access_token).await {
                Ok(value) => {
                    info!(
                        url = %url,
                        attempt = attempt,
                        "xero_fetch_complete"
                    );
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        url = %url,
                        attempt = attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "xero_fetch_retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn parse_resource_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
