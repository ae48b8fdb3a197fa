use serde::Deserialize;

/// Main configuration structure for Skein
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    /// URLs the crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Number of concurrent crawl workers
    pub max_threads: usize,

    /// Stop after this many URLs were visited, -1 for no limit
    pub stop_count: i64,

    /// Stop when no fetch succeeded for this many minutes
    pub silent_stop_minutes: u64,

    /// Upper bound for idle waits on an empty frontier (milliseconds)
    pub poll_interval_ms: u64,

    /// Put URLs whose retrieval failed back on the frontier
    pub retry_failed: bool,

    /// How often a single URL may be re-queued after failing
    pub max_retries: u32,

    /// Strip everything from the first `?` of every extracted URL
    pub strip_query_params: bool,

    /// URLs of this length or longer are never queued
    pub max_url_length: usize,

    /// Skip links marked `rel="nofollow"`
    pub respect_nofollow: bool,

    /// Follow links within the page's own domain
    pub in_domain: bool,

    /// Follow links leaving the page's domain
    pub out_domain: bool,

    /// Follow links into sub-domains of the page's domain
    pub sub_domain: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_threads: 4,
            stop_count: -1,
            silent_stop_minutes: 10,
            poll_interval_ms: 1000,
            retry_failed: true,
            max_retries: 3,
            strip_query_params: true,
            max_url_length: 400,
            respect_nofollow: false,
            in_domain: true,
            out_domain: false,
            sub_domain: false,
        }
    }
}

/// Which throttle guards outgoing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThrottleKind {
    #[default]
    None,
    Fixed,
    Window,
}

/// Throttle configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ThrottleConfig {
    pub kind: ThrottleKind,

    /// Minimum gap between two requests for the fixed-interval throttle (milliseconds)
    pub interval_ms: u64,

    /// Permits per window for the time-window throttle
    pub max_requests: u32,

    /// Window length for the time-window throttle (milliseconds)
    pub window_ms: u64,

    /// Keep one throttle per host instead of a single global one
    pub per_host: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            kind: ThrottleKind::None,
            interval_ms: 1000,
            max_requests: 10,
            window_ms: 1000,
            per_host: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub name: String,

    /// Version of the crawler
    pub version: String,

    /// URL with information about the crawler
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "skein".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
        }
    }
}

/// URL acceptance configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterConfig {
    /// File types that may be fetched; empty means all
    pub file_type_whitelist: Vec<String>,

    /// File types that are never fetched
    pub file_type_blacklist: Vec<String>,

    /// Regexes a URL must match at least one of (when non-empty)
    pub url_whitelist: Vec<String>,

    /// Regexes a URL must not match
    pub url_blacklist: Vec<String>,

    /// Domains followed even when outside the crawl scope (`*.example.com` allowed)
    pub allowed_domains: Vec<String>,

    /// Ordered rewrite rules applied to every extracted URL
    pub rewrite: Vec<RewriteRule>,
}

/// A single regex find-and-replace-all rule
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRule {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
}
