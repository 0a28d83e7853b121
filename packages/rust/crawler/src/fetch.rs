//! Page fetching.
//!
//! A [`Fetcher`] performs one attempt per URL. Failures come back as a typed
//! [`FetchError`] which the crawl loop records and moves past; nothing here
//! retries.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use sitecrawl_shared::{Result, SiteCrawlError};

use crate::normalize::CanonicalUrl;

/// Maximum redirects followed for a single fetch.
const MAX_REDIRECTS: usize = 5;

/// What went wrong while fetching a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// Connection, TLS, DNS, or redirect failure.
    Transport(String),
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The response body could not be read or decoded.
    Body(String),
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("request timed out"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Body(msg) => write!(f, "body read failed: {msg}"),
        }
    }
}

/// A failed fetch of a single page. Never fatal to a crawl.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to fetch {url}: {kind}")]
pub struct FetchError {
    /// The URL that was requested.
    pub url: CanonicalUrl,
    /// The underlying cause.
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(url: CanonicalUrl, kind: FetchErrorKind) -> Self {
        Self { url, kind }
    }

    fn from_reqwest(url: &CanonicalUrl, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if let Some(status) = err.status() {
            FetchErrorKind::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            FetchErrorKind::Body(err.to_string())
        } else {
            FetchErrorKind::Transport(err.to_string())
        };
        Self::new(url.clone(), kind)
    }
}

/// A page retrieved with a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Where the body came from once redirects were followed. Relative links
    /// in the body resolve against this, not the requested URL.
    pub url: CanonicalUrl,
    /// Response body text.
    pub body: String,
}

/// Retrieves the markup behind a URL.
///
/// Implementations must be cheap to share across tasks; the crawl engine
/// holds one behind an `Arc` and calls it from every worker.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch `url` once, returning the page on a 2xx response.
    fn fetch(
        &self,
        url: &CanonicalUrl,
    ) -> impl Future<Output = std::result::Result<Page, FetchError>> + Send;
}

/// [`Fetcher`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client with the given per-request timeout and User-Agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| SiteCrawlError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &CanonicalUrl) -> std::result::Result<Page, FetchError> {
        debug!(%url, "fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url.clone(),
                FetchErrorKind::Status(status.as_u16()),
            ));
        }

        let final_url = match CanonicalUrl::parse(response.url().as_str()) {
            Ok(final_url) => final_url,
            Err(_) => url.clone(),
        };
        if &final_url != url {
            debug!(%url, redirected_to = %final_url, "followed redirect");
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        Ok(Page {
            url: final_url,
            body,
        })
    }
}
