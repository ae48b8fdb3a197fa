use crate::url::DownloadFilter;
use crate::{ConfigError, ConfigResult};
use regex::Regex;

/// Why a cleaned URL was or was not accepted for the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    TooLong,
    FileType,
    NotWhitelisted,
    Blacklisted,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Acceptance rules applied to every cleaned link before it reaches the frontier
///
/// Checks run in order: length limit, [`DownloadFilter`], URL whitelist (at
/// least one pattern must match when any are configured), URL blacklist (no
/// pattern may match).
#[derive(Debug, Clone)]
pub struct UrlRules {
    max_length: usize,
    download_filter: DownloadFilter,
    whitelist: Vec<Regex>,
    blacklist: Vec<Regex>,
}

impl Default for UrlRules {
    fn default() -> Self {
        Self::new(400)
    }
}

impl UrlRules {
    /// Creates rules accepting every URL shorter than `max_length`
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            download_filter: DownloadFilter::new(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }

    pub fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }

    pub fn set_download_filter(&mut self, filter: DownloadFilter) {
        self.download_filter = filter;
    }

    pub fn download_filter(&self) -> &DownloadFilter {
        &self.download_filter
    }

    /// Adds a pattern a URL must match (when any whitelist pattern exists)
    pub fn add_whitelist_pattern(&mut self, pattern: &str) -> ConfigResult<()> {
        self.whitelist.push(compile(pattern)?);
        Ok(())
    }

    /// Adds a pattern a URL must not match
    pub fn add_blacklist_pattern(&mut self, pattern: &str) -> ConfigResult<()> {
        self.blacklist.push(compile(pattern)?);
        Ok(())
    }

    /// Evaluates a cleaned URL
    pub fn verdict(&self, url: &str) -> Verdict {
        if url.len() >= self.max_length {
            return Verdict::TooLong;
        }

        if !self.download_filter.is_accepted(url) {
            return Verdict::FileType;
        }

        if !self.whitelist.is_empty() && !self.whitelist.iter().any(|r| r.is_match(url)) {
            return Verdict::NotWhitelisted;
        }

        if self.blacklist.iter().any(|r| r.is_match(url)) {
            return Verdict::Blacklisted;
        }

        Verdict::Accept
    }

    /// Shorthand for `verdict(url).is_accepted()`
    pub fn accepts(&self, url: &str) -> bool {
        self.verdict(url).is_accepted()
    }
}

fn compile(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("Invalid URL pattern '{}': {}", pattern, e))
    })
}
