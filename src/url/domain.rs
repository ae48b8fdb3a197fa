use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use skein::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses `url` and returns its lowercase host
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_domain)
}

/// Parses a URL the crawler can visit: http(s) with a host
pub fn parse_crawl_url(url: &str) -> UrlResult<Url> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(format!("{}: {}", url, e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UrlError::InvalidScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }
    Ok(parsed)
}

/// Drops a leading `www.` label
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Whether two hosts name the same site (case-insensitive, `www.` ignored)
pub fn same_site(a: &str, b: &str) -> bool {
    strip_www(a).eq_ignore_ascii_case(strip_www(b))
}

/// Whether `host` is a strict sub-domain of `parent`
///
/// `blog.example.com` is a sub-domain of `example.com` and of `www.example.com`;
/// `example.com` is not a sub-domain of itself.
pub fn is_sub_domain(host: &str, parent: &str) -> bool {
    let host = strip_www(host).to_ascii_lowercase();
    let parent = strip_www(parent).to_ascii_lowercase();
    host.len() > parent.len() && host.ends_with(&format!(".{}", parent))
}
