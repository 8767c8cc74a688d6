//! Proxy-only HTTP transport
//!
//! This module handles every network request the crawler makes:
//! - Building a client that routes all traffic through the configured proxy
//! - Applying the per-request wall-clock timeout
//! - Classifying failures into timeout, refusal, protocol and status errors
//! - Verifying that the proxy is actually in the path (`check_proxy`)
//!
//! There is no direct-connection fallback. If the proxy is unreachable every
//! fetch fails with `TransportFailure::Refused`.

use crate::config::TransportConfig;
use crate::state::FailureKind;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Proxy};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for a single fetch
const MAX_REDIRECTS: usize = 10;

/// Non-`text/*` MIME types that links are read from
const DOCUMENT_TYPES: &[&str] = &["application/xhtml+xml", "application/xml"];

/// A complete 2xx response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Lowercase MIME essence of the Content-Type header, empty if absent
    pub content_type: String,
    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Builds a 200 response, mainly for transports that do not speak HTTP
    pub fn ok(final_url: Url, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            final_url,
            status: 200,
            content_type: mime_essence(content_type),
            body: body.into(),
        }
    }

    /// Returns true if links can be read from the body
    ///
    /// Untyped bodies and every `text/*` type qualify, so plain-text mirror
    /// lists are scanned too.
    pub fn is_document(&self) -> bool {
        let content_type = self.content_type.as_str();
        content_type.is_empty()
            || content_type.starts_with("text/")
            || DOCUMENT_TYPES.contains(&content_type)
    }
}

/// Why a fetch produced no usable response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("HTTP status {0}")]
    NonSuccessStatus(u16),
}

impl TransportFailure {
    /// Maps the failure onto the summary classification
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout => FailureKind::Timeout,
            Self::Refused => FailureKind::Refused,
            Self::ProtocolError(_) => FailureKind::Protocol,
            Self::NonSuccessStatus(_) => FailureKind::Status,
        }
    }
}

/// Result of a single fetch
pub type FetchOutcome = Result<FetchResponse, TransportFailure>;

/// Retrieves the content at an address
///
/// Implementations must bound every call by a timeout and must never panic on
/// network conditions; all failures are reported through `FetchOutcome`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, address: &Url) -> FetchOutcome;
}

/// Reqwest-backed transport routing every request through one proxy
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport from the proxy configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Proxy URL and user agent
    /// * `timeout` - Wall-clock bound for each request, including the body
    ///
    /// # Returns
    ///
    /// * `Ok(HttpTransport)` - Client built with the proxy installed
    /// * `Err(reqwest::Error)` - The proxy URL was rejected or the client failed to build
    pub fn new(config: &TransportConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        // Proxy::all also disables any system proxy discovery
        let proxy = Proxy::all(config.proxy_url.as_str())?;

        let client = Client::builder()
            .proxy(proxy)
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// The configured per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, address: &Url) -> FetchOutcome {
        let response = self
            .client
            .get(address.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportFailure::NonSuccessStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(mime_essence)
            .unwrap_or_default();

        let body = response.bytes().await.map_err(classify_error)?;

        Ok(FetchResponse {
            final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, address: &Url) -> FetchOutcome {
        // The client timeout covers the request; this also bounds body streaming
        match tokio::time::timeout(self.timeout, self.send(address)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportFailure::Timeout),
        }
    }
}

/// Classifies a reqwest error
fn classify_error(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::Timeout
    } else if e.is_connect() {
        TransportFailure::Refused
    } else {
        TransportFailure::ProtocolError(e.to_string())
    }
}

/// Returns the lowercase MIME essence of a Content-Type value
///
/// `"Text/HTML; charset=utf-8"` becomes `"text/html"`.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Fetches the check page through the transport and looks for the marker text
///
/// # Returns
///
/// * `Ok(true)` - The page was fetched and contains `marker`
/// * `Ok(false)` - The page was fetched but the marker is missing
/// * `Err(TransportFailure)` - The page could not be fetched at all
pub async fn check_proxy(
    transport: &dyn Transport,
    check_url: &Url,
    marker: &str,
) -> Result<bool, TransportFailure> {
    let response = transport.fetch(check_url).await?;
    let body = String::from_utf8_lossy(&response.body);
    Ok(body.contains(marker))
}
