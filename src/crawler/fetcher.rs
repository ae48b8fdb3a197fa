//! Page fetching
//!
//! This module defines the [`Fetcher`] contract consumed by the crawler and
//! provides the default implementations:
//! - [`HttpFetcher`]: plain HTTP(S) GET via `reqwest`
//! - [`ThrottledFetcher`]: wraps any fetcher and holds a [`Throttle`] before each request
//!
//! Error classification:
//!
//! | Condition | Error | Transient |
//! |-----------|-------|-----------|
//! | HTTP 5xx, 408, 429 | `Http` | yes |
//! | Other non-2xx | `Http` | no |
//! | Timeout | `Timeout` | yes |
//! | Connection / transport failure | `Network` | yes |
//! | Block page, empty body | `BadDocument` | no |

use crate::config::{FetchConfig, UserAgentConfig};
use crate::throttle::Throttle;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Node};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The URL that was requested
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value (empty if absent)
    pub content_type: String,

    /// Page body
    pub body: String,

    /// Name of the fetcher that produced this document
    pub fetched_by: Option<String>,
}

impl Document {
    /// Creates a 200 `text/html` document that was not redirected
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
            fetched_by: None,
        }
    }

    /// Whether the body should be parsed as HTML
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        self.content_type.is_empty() || self.content_type.to_ascii_lowercase().contains("html")
    }

    /// The URL links on this page are resolved against
    pub fn base_url(&self) -> &str {
        if self.final_url.is_empty() {
            &self.url
        } else {
            &self.final_url
        }
    }

    /// Visible text of the page with whitespace collapsed
    ///
    /// Script and style contents are skipped. Non-HTML bodies are returned
    /// as-is apart from whitespace collapsing.
    pub fn readable_text(&self) -> String {
        if !self.is_html() {
            return collapse_whitespace(&self.body);
        }

        let html = Html::parse_document(&self.body);
        let mut text = String::new();
        for node in html.tree.nodes() {
            let Node::Text(fragment) = node.value() else {
                continue;
            };

            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .is_some_and(|element| {
                    matches!(element.name(), "script" | "style" | "noscript" | "template")
                });
            if !hidden {
                text.push_str(fragment);
                text.push(' ');
            }
        }

        collapse_whitespace(&text)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Why a fetch produced no usable document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("bad document: {0}")]
    BadDocument(String),

    #[error("no fetcher produced a usable document")]
    Exhausted,
}

impl FetchError {
    /// Whether retrying the same URL later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status } => *status >= 500 || *status == 408 || *status == 429,
            Self::Timeout | Self::Network(_) => true,
            Self::BadDocument(_) | Self::Exhausted => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
            }
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Retrieves a page for a URL
///
/// Implementations are shared by all workers and must be safe to call
/// concurrently. Timeouts are the fetcher's responsibility.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Short name used in logs and cascade health tables
    fn name(&self) -> &str;

    async fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        (**self).fetch(url).await
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Crawler identification, sent as `name/version (+contact)`
/// * `fetch` - Timeouts and redirect limit
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .redirect(Policy::limited(fetch.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats the User-Agent header value
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    if config.contact_url.is_empty() {
        format!("{}/{}", config.name, config.version)
    } else {
        format!("{}/{} (+{})", config.name, config.version, config.contact_url)
    }
}

/// Plain HTTP GET fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    name: String,
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &UserAgentConfig, fetch: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(user_agent, fetch)?))
    }

    /// Wraps an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            name: "http".to_string(),
            client,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            tracing::debug!("{} answered {}", url, status);
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.text().await?;

        Ok(Document {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body,
            fetched_by: Some(self.name.clone()),
        })
    }
}

/// Holds a throttle before delegating to the wrapped fetcher
pub struct ThrottledFetcher<F> {
    inner: F,
    throttle: Arc<dyn Throttle>,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, throttle: Arc<dyn Throttle>) -> Self {
        Self { inner, throttle }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.throttle.hold().await;
        self.inner.fetch(url).await
    }
}
