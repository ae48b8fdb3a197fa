//! URL handling module for Skein
//!
//! This module provides URL cleaning, file-type filtering, acceptance rules,
//! domain extraction, wildcard matching, and link scope classification.

mod domain;
mod download_filter;
mod matcher;
mod normalize;
mod rules;

// Re-export main functions
pub use domain::{
    extract_domain, host_of, is_sub_domain, parse_crawl_url, same_site, strip_www,
};
pub use download_filter::{file_type, DownloadFilter};
pub use matcher::{matches_any, matches_wildcard};
pub use normalize::{remove_anchor, remove_query, remove_session_id, UrlCleaner};
pub use rules::{UrlRules, Verdict};

/// Where a link points relative to the page it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkClass {
    /// Same host as the page (ignoring `www.`)
    InDomain,
    /// A sub-domain of the page's host, or the page is a sub-domain of the link's host
    SubDomain,
    /// Any other host
    OutDomain,
}

/// Classifies a link host against the host of the page that contains it
///
/// # Examples
///
/// ```
/// use skein::url::{classify_link, LinkClass};
///
/// assert_eq!(classify_link("www.a.test", "a.test"), LinkClass::InDomain);
/// assert_eq!(classify_link("a.test", "blog.a.test"), LinkClass::SubDomain);
/// assert_eq!(classify_link("a.test", "b.test"), LinkClass::OutDomain);
/// ```
pub fn classify_link(page_host: &str, link_host: &str) -> LinkClass {
    if same_site(page_host, link_host) {
        LinkClass::InDomain
    } else if is_sub_domain(link_host, page_host) || is_sub_domain(page_host, link_host) {
        LinkClass::SubDomain
    } else {
        LinkClass::OutDomain
    }
}
