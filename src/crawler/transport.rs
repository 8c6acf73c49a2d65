//! HTTP transport abstraction
//!
//! Every network request the crawler makes (pages, robots.txt, sitemaps) goes
//! through [`FetchTransport`], so tests can swap in an in-process mock.
//! Transports never follow redirects themselves: each hop is a separate
//! request so that it can be paced and checked against robots.txt.

use crate::config::CrawlConfig;
use crate::url::normalize;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirect hops followed for a single task
pub const MAX_REDIRECTS: usize = 10;

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,

    /// Location header value, if present
    pub location: Option<String>,

    /// Content-Type header value, if present
    pub content_type: Option<String>,

    /// Response body, at most `max_body_bytes` long
    pub body: Vec<u8>,

    /// True when the body was cut off at `max_body_bytes`
    pub truncated: bool,
}

/// Transport-level failures: no HTTP status was obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Network(String),
}

impl From<TransportError> for crate::FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Network(msg) => Self::Network(msg),
        }
    }
}

/// Performs a single HTTP GET
#[async_trait]
pub trait FetchTransport: Send + Sync {
    /// Fetches `url` without following redirects and reads at most
    /// `max_body_bytes` of the body
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `timeout` - Total time allowed for the request, body included
    /// * `max_body_bytes` - Body size cap; longer bodies are truncated
    ///
    /// # Returns
    ///
    /// * `Ok(TransportResponse)` - Any HTTP status, including errors and 3xx
    /// * `Err(TransportError)` - No response could be obtained
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<TransportResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and timeouts)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with a client built from the crawler configuration
    pub fn new(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Result<TransportResponse, TransportError> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let location = headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Read incrementally so oversized bodies are never fully buffered
        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response.chunk().await.map_err(classify_error)? {
            let remaining = max_body_bytes.saturating_sub(body.len());
            if chunk.len() > remaining {
                body.extend_from_slice(&chunk[..remaining]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status,
            location,
            content_type,
            body,
            truncated,
        })
    }
}

/// Where a redirect response points, resolved against the URL it came from
///
/// Returns None for non-redirect statuses and for a missing or unusable
/// Location header (non-http schemes included).
pub fn redirect_target(response: &TransportResponse, from: &Url) -> Option<Url> {
    if !matches!(response.status, 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let location = response.location.as_deref()?.trim();
    normalize(location, Some(from)).ok()
}

/// Maps a reqwest error onto the transport taxonomy
fn classify_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Network(format!("connection failed: {}", err))
    } else if err.is_redirect() {
        TransportError::Network(format!("redirect error: {}", err))
    } else {
        TransportError::Network(err.to_string())
    }
}
