//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of a harvest:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Issuing GET requests through the shared [`RateLimiter`]
//! - Decoding JSON bodies
//! - Error classification

use crate::config::FetcherConfig;
use crate::harvest::RateLimiter;
use crate::FetchError;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status and decoded body of one GET request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// HTTP status code
    pub status_code: u16,
    /// Decoded JSON body (`Null` when a non-200 body is not JSON)
    pub body: Value,
}

impl FetchResult {
    /// Whether the resource was served with `200 OK`
    pub fn is_ok(&self) -> bool {
        self.status_code == StatusCode::OK.as_u16()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(config.request_timeout.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues rate-limited GET requests and decodes their JSON bodies
///
/// Cloning is cheap; clones share the client, the limiter and the request counter.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    limiter: RateLimiter,
    requests: Arc<AtomicU64>,
}

impl Fetcher {
    pub fn new(client: Client, limiter: RateLimiter) -> Self {
        Self {
            client,
            limiter,
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Builds the client and limiter described by `config`
    pub fn from_config(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        let limiter = RateLimiter::new(
            config.max_concurrent_requests as usize,
            Duration::from_millis(config.minimum_time_per_request),
        );
        Ok(Self::new(client, limiter))
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Total number of requests sent by this fetcher and its clones
    pub fn requests_sent(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Fetches `url` inside a paced limiter slot
    ///
    /// Network and decode failures are returned as [`FetchError`]; a non-200
    /// status is not an error and is left for the caller to inspect.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.limiter.paced(self.get(url)).await
    }

    async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        tracing::debug!("Fetching {}", url);
        let start = Instant::now();
        self.requests.fetch_add(1, Ordering::Relaxed);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        let body = if status == StatusCode::OK {
            serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        tracing::debug!(
            "Fetched {} ({}) in {}ms",
            url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        Ok(FetchResult {
            status_code: status.as_u16(),
            body,
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: error,
        }
    }
}
