//! Skein: a concurrent crawl scheduler
//!
//! This crate drives a bounded pool of crawl workers over a shared URL frontier.
//! Workers fetch pages through a pluggable [`crawler::Fetcher`], extract links,
//! clean and filter them, and feed them back into the frontier until the crawl
//! runs dry, hits its visit budget, is stopped, or goes silent.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod throttle;
pub mod url;

use thiserror::Error;

/// Main error type for Skein operations
#[derive(Debug, Error)]
pub enum SkeinError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid crawl configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid throttle: {0}")]
    Throttle(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Skein operations
pub type Result<T> = std::result::Result<T, SkeinError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    CascadingFetcher, CrawlEvent, Crawler, Document, FetchError, Fetcher, HtmlLinkExtractor,
    HttpFetcher, LinkExtractor, LinkScope, StopHandle,
};
pub use output::CrawlReport;
pub use state::{CrawlState, Frontier, StopReason};
pub use throttle::{FixedIntervalThrottle, NoThrottle, Throttle, TimeWindowThrottle};
pub use url::{DownloadFilter, UrlCleaner, UrlRules};
