//! Link extraction
//!
//! A [`LinkExtractor`] turns a fetched [`Document`] into the set of absolute
//! URLs the crawler may follow, restricted by a [`LinkScope`].

use super::Document;
use crate::url::{classify_link, host_of, matches_any, LinkClass};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Which links a crawl follows, relative to the page they were found on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkScope {
    /// Same host as the page (ignoring `www.`)
    pub in_domain: bool,

    /// Any other host
    pub out_domain: bool,

    /// Sub-domains of the page's host, or parents of it
    pub sub_domain: bool,

    /// Wildcard domain patterns followed regardless of the flags above
    pub allowed_domains: Vec<String>,
}

impl LinkScope {
    pub fn new(in_domain: bool, out_domain: bool, sub_domain: bool) -> Self {
        Self {
            in_domain,
            out_domain,
            sub_domain,
            allowed_domains: Vec::new(),
        }
    }

    /// Whether a link from `page_host` to `link_host` may be followed
    pub fn allows(&self, page_host: &str, link_host: &str) -> bool {
        let enabled = match classify_link(page_host, link_host) {
            LinkClass::InDomain => self.in_domain,
            LinkClass::SubDomain => self.sub_domain,
            LinkClass::OutDomain => self.out_domain,
        };
        enabled || matches_any(&self.allowed_domains, link_host)
    }
}

/// Extracts candidate outbound URLs from a fetched document
///
/// Must be a pure function of its inputs; it is called concurrently from all
/// workers.
pub trait LinkExtractor: Send + Sync {
    fn extract_links(&self, document: &Document, scope: &LinkScope) -> HashSet<String>;
}

/// Default extractor for HTML documents, built on `scraper`
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - `rel="nofollow"` links, when `respect_nofollow` is set
///
/// Relative links resolve against `<base href>` when present, otherwise
/// against the document's final URL.
#[derive(Debug, Clone, Default)]
pub struct HtmlLinkExtractor {
    respect_nofollow: bool,
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nofollow(respect_nofollow: bool) -> Self {
        Self { respect_nofollow }
    }

    /// Returns every followable absolute link in `html`, unscoped
    pub fn links_in(&self, html: &str, page_url: &Url) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = base_href(&document, page_url).unwrap_or_else(|| page_url.clone());
        let mut links = Vec::new();

        if let Ok(a_selector) = Selector::parse("a[href]") {
            for element in document.select(&a_selector) {
                let attrs = element.value();
                if attrs.attr("download").is_some() {
                    continue;
                }
                if self.respect_nofollow && is_nofollow(attrs.attr("rel")) {
                    continue;
                }

                if let Some(absolute_url) = attrs.attr("href").and_then(|h| resolve_link(h, &base))
                {
                    links.push(absolute_url);
                }
            }
        }

        if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
            for element in document.select(&canonical_selector) {
                if let Some(absolute_url) = element
                    .value()
                    .attr("href")
                    .and_then(|h| resolve_link(h, &base))
                {
                    links.push(absolute_url);
                }
            }
        }

        links
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, document: &Document, scope: &LinkScope) -> HashSet<String> {
        if !document.is_html() {
            return HashSet::new();
        }

        let Ok(page_url) = Url::parse(document.base_url()) else {
            tracing::debug!("Cannot extract links from unparseable URL {}", document.base_url());
            return HashSet::new();
        };
        let page_host = page_url.host_str().unwrap_or_default().to_string();

        self.links_in(&document.body, &page_url)
            .into_iter()
            .filter(|link| {
                host_of(link).is_some_and(|link_host| scope.allows(&page_host, &link_host))
            })
            .collect()
    }
}

fn base_href(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    page_url.join(href.trim()).ok()
}

fn is_nofollow(rel: Option<&str>) -> bool {
    rel.is_some_and(|rel| {
        rel.split_whitespace()
            .any(|token| token.eq_ignore_ascii_case("nofollow"))
    })
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then(|| absolute_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    fn links(html: &str) -> Vec<String> {
        HtmlLinkExtractor::new().links_in(html, &page_url())
    }

    fn scoped(html: &str, scope: &LinkScope) -> HashSet<String> {
        let doc = Document::html("https://example.com/dir/page", html);
        HtmlLinkExtractor::new().extract_links(&doc, scope)
    }

    #[test]
    fn test_resolves_relative_links() {
        let found = links(r#"<a href="/other">1</a><a href="sibling">2</a><a href="../up">3</a>"#);
        assert_eq!(
            found,
            vec![
                "https://example.com/other",
                "https://example.com/dir/sibling",
                "https://example.com/up",
            ]
        );
    }

    #[test]
    fn test_base_href_overrides_page_url() {
        let found = links(
            r#"<html><head><base href="https://cdn.example.com/root/"></head>
               <body><a href="x.html">x</a></body></html>"#,
        );
        assert_eq!(found, vec!["https://cdn.example.com/root/x.html"]);
    }

    #[test]
    fn test_skips_special_links() {
        let found = links(
            r##"<a href="javascript:void(0)">j</a>
                <a href="JavaScript:alert(1)">j</a>
                <a href="mailto:test@example.com">m</a>
                <a href="tel:+1234567890">t</a>
                <a href="data:text/html,<h1>Test</h1>">d</a>
                <a href="#section">f</a>
                <a href="/file.pdf" download>dl</a>
                <a href="ftp://example.com/file">ftp</a>
                <a href="/valid">ok</a>"##,
        );
        assert_eq!(found, vec!["https://example.com/valid"]);
    }

    #[test]
    fn test_canonical_link() {
        let found = links(
            r#"<html><head><link rel="canonical" href="https://example.com/canonical" /></head></html>"#,
        );
        assert_eq!(found, vec!["https://example.com/canonical"]);
    }

    #[test]
    fn test_nofollow_only_skipped_when_respected() {
        let html = r#"<a href="/page" rel="external NoFollow">Link</a>"#;
        assert_eq!(links(html).len(), 1);
        assert!(HtmlLinkExtractor::with_nofollow(true)
            .links_in(html, &page_url())
            .is_empty());
    }

    #[test]
    fn test_scope_in_domain_only() {
        let html = r#"<a href="https://www.example.com/a">a</a>
                      <a href="https://blog.example.com/b">b</a>
                      <a href="https://other.test/c">c</a>"#;
        let found = scoped(html, &LinkScope::new(true, false, false));
        assert_eq!(found.len(), 1);
        assert!(found.contains("https://www.example.com/a"));
    }

    #[test]
    fn test_scope_sub_and_out_domain() {
        let html = r#"<a href="https://blog.example.com/b">b</a>
                      <a href="https://other.test/c">c</a>"#;

        let subs = scoped(html, &LinkScope::new(false, false, true));
        assert_eq!(subs.len(), 1);
        assert!(subs.contains("https://blog.example.com/b"));

        let outs = scoped(html, &LinkScope::new(false, true, false));
        assert_eq!(outs.len(), 1);
        assert!(outs.contains("https://other.test/c"));
    }

    #[test]
    fn test_allowed_domains_extend_scope() {
        let mut scope = LinkScope::new(true, false, false);
        scope.allowed_domains.push("*.partner.test".to_string());

        let found = scoped(
            r#"<a href="https://docs.partner.test/x">x</a><a href="https://other.test/y">y</a>"#,
            &scope,
        );
        assert_eq!(found.len(), 1);
        assert!(found.contains("https://docs.partner.test/x"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let found = scoped(
            r#"<a href="/a">1</a><a href="https://example.com/a">2</a>"#,
            &LinkScope::new(true, false, false),
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_non_html_document_has_no_links() {
        let doc = Document {
            content_type: "application/pdf".to_string(),
            ..Document::html("https://example.com/x.pdf", r#"<a href="/a">a</a>"#)
        };
        assert!(HtmlLinkExtractor::new()
            .extract_links(&doc, &LinkScope::new(true, true, true))
            .is_empty());
    }
}
