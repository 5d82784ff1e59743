//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - GET requests with a capped, streamed body
//! - Error classification (network, timeout, HTTP status, oversized body)
//!
//! The client only follows redirects that land on the same normalized URL
//! (`/docs` -> `/docs/`). Any other redirect is returned to the caller as
//! [`FetchOutcome::Redirect`] so the target goes through the fetch policy,
//! the visited set and the host limiter like any discovered link.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::url::normalize_url;
use chrono::{DateTime, Utc};
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// What a completed request produced
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A 2xx response with its body
    Page(FetchResult),

    /// A 3xx response pointing at a different URL
    Redirect { status: u16, location: Url },
}

/// A successful fetch
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL that was requested
    pub url: Url,

    /// The URL the response came from, after redirects to the same page
    /// (the base for resolving relative links)
    pub final_url: Url,

    /// HTTP status code (always 2xx)
    pub status_code: u16,

    /// Raw response body
    pub body: Vec<u8>,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// When the response was received
    pub fetched_at: DateTime<Utc>,
}

/// Classified fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("Body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Too many redirects")]
    TooManyRedirects,
}

impl FetchError {
    /// Short label used in logs and statistics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::HttpStatus { .. } => "http-status",
            Self::TooLarge { .. } => "too-large",
            Self::TooManyRedirects => "too-many-redirects",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_redirect() {
            Self::TooManyRedirects
        } else if e.is_connect() {
            Self::Network(format!("Connection failed: {}", e))
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Bound on the whole request, body included
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
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(same_page_redirects())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Follows a redirect only while it normalizes to the originally requested URL
fn same_page_redirects() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let origin = attempt.previous().first().map(|u| normalize_url(u.as_str()));
        let target = normalize_url(attempt.url().as_str());
        match (origin, target) {
            (Some(Ok(origin)), Ok(target)) if origin == target => attempt.follow(),
            _ => attempt.stop(),
        }
    })
}

/// Performs GET requests; holds no crawl state
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: u64,
}

impl Fetcher {
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, crawler.fetch_timeout())?;
        Ok(Self::with_client(client, crawler.max_body_bytes))
    }

    pub fn with_client(client: Client, max_body_bytes: u64) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// Fetches a URL
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx | `Ok(FetchOutcome::Page)` |
    /// | 3xx with a `Location` to another URL | `Ok(FetchOutcome::Redirect)` |
    /// | Redirect loop on the same URL | `TooManyRedirects` |
    /// | Other status | `HttpStatus` |
    /// | Content-Length or body over the cap | `TooLarge` |
    /// | Request exceeded the timeout | `Timeout` |
    /// | DNS, connect, TLS, redirect loop, ... | `Network` |
    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome, FetchError> {
        let mut response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| response.url().join(v).ok());
            if let Some(location) = location {
                return Ok(FetchOutcome::Redirect {
                    status: status.as_u16(),
                    location,
                });
            }
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchOutcome::Page(FetchResult {
            url: url.clone(),
            final_url,
            status_code: status.as_u16(),
            body,
            content_type,
            fetched_at: Utc::now(),
        }))
    }
}
