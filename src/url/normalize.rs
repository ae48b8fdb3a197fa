use regex::Regex;
use std::sync::OnceLock;

/// Session id parameters removed from every URL
///
/// Matches an optional `;`/`&` separator, a known session parameter name and an
/// id of 32 to 200 characters.
const SESSION_ID_PATTERN: &str =
    r"[&;]?\b(?:jsessionid|s|sid|PHPSESSID|sessionid)=[A-Za-z0-9_\-]{32,200}";

fn session_id_regex() -> &'static Regex {
    static SESSION_ID: OnceLock<Regex> = OnceLock::new();
    SESSION_ID.get_or_init(|| Regex::new(SESSION_ID_PATTERN).expect("session id pattern is valid"))
}

/// A regex rewrite rule as registered by the user
///
/// The pattern is compiled once when the rule is added. A pattern that does not
/// compile is kept so it can be reported every time it would have applied.
#[derive(Debug, Clone)]
struct RewriteRule {
    pattern: String,
    compiled: Result<Regex, String>,
    replacement: String,
}

/// Cleans raw extracted URLs into the form used as the frontier's dedup key
///
/// # Cleaning Steps
///
/// 1. Remove session ids (`;jsessionid=…`, `sid=…`, …)
/// 2. Remove the fragment (everything from `#`) and any `?` it leaves dangling
/// 3. If query stripping is enabled, remove everything from the first `?`
/// 4. Apply the rewrite rules in the order they were added
///
/// # Examples
///
/// ```
/// use skein::url::UrlCleaner;
///
/// let cleaner = UrlCleaner::new(true);
/// assert_eq!(cleaner.clean("http://a.test/x?page=2#top"), "http://a.test/x");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UrlCleaner {
    strip_query_params: bool,
    rules: Vec<RewriteRule>,
}

impl UrlCleaner {
    /// Creates a cleaner without rewrite rules
    pub fn new(strip_query_params: bool) -> Self {
        Self {
            strip_query_params,
            rules: Vec::new(),
        }
    }

    /// Enables or disables query stripping
    pub fn set_strip_query_params(&mut self, strip: bool) {
        self.strip_query_params = strip;
    }

    pub fn strip_query_params(&self) -> bool {
        self.strip_query_params
    }

    /// Appends a find-and-replace-all rule
    ///
    /// Invalid patterns are accepted here and skipped with a warning whenever
    /// [`clean`](Self::clean) runs, leaving the URL untouched by that rule.
    pub fn add_rule(&mut self, pattern: &str, replacement: &str) {
        let compiled = Regex::new(pattern).map_err(|e| e.to_string());
        if let Err(e) = &compiled {
            tracing::warn!("Rewrite rule '{}' does not compile: {}", pattern, e);
        }
        self.rules.push(RewriteRule {
            pattern: pattern.to_string(),
            compiled,
            replacement: replacement.to_string(),
        });
    }

    /// Number of registered rewrite rules, including broken ones
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Cleans a single URL
    pub fn clean(&self, url: &str) -> String {
        let url = remove_session_id(url.trim());
        // the fragment can hide a `?` that only dangles once it is gone
        let mut url = tidy_query(remove_anchor(&url));

        if self.strip_query_params {
            url = remove_query(&url).to_string();
        }

        for rule in &self.rules {
            match &rule.compiled {
                Ok(regex) => {
                    url = regex
                        .replace_all(&url, rule.replacement.as_str())
                        .into_owned();
                }
                Err(e) => {
                    tracing::warn!("Skipping rewrite rule '{}': {}", rule.pattern, e);
                }
            }
        }

        url
    }
}

/// Removes session ids, then a dangling `?` and a `?&` left behind by the removal
pub fn remove_session_id(url: &str) -> String {
    let regex = session_id_regex();
    let mut cleaned = String::with_capacity(url.len());
    let mut last = 0;

    for m in regex.find_iter(url) {
        // ids longer than 200 characters are not session ids
        let next = url[m.end()..].chars().next();
        if next.is_some_and(|c| c.is_alphanumeric() || c == '_') {
            continue;
        }
        cleaned.push_str(&url[last..m.start()]);
        last = m.end();
    }
    cleaned.push_str(&url[last..]);

    tidy_query(&cleaned)
}

/// Collapses `?&` to `?` and drops a trailing `?`
fn tidy_query(url: &str) -> String {
    let mut tidy = url.replace("?&", "?");
    if tidy.ends_with('?') {
        tidy.pop();
    }
    tidy
}

/// Removes the fragment
pub fn remove_anchor(url: &str) -> &str {
    url.split_once('#').map_or(url, |(head, _)| head)
}

/// Removes the query string
pub fn remove_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(head, _)| head)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = "0123456789abcdef0123456789ABCDEF";

    #[test]
    fn test_remove_fragment() {
        let cleaner = UrlCleaner::new(false);
        assert_eq!(cleaner.clean("http://a.test/x#frag"), "http://a.test/x");
        assert_eq!(cleaner.clean("http://a.test/x#"), "http://a.test/x");
    }

    #[test]
    fn test_strip_query_params() {
        let cleaner = UrlCleaner::new(true);
        assert_eq!(cleaner.clean("http://a.test/x?a=1&b=2"), "http://a.test/x");

        let keeping = UrlCleaner::new(false);
        assert_eq!(
            keeping.clean("http://a.test/x?a=1&b=2"),
            "http://a.test/x?a=1&b=2"
        );
    }

    #[test]
    fn test_remove_jsessionid_path_parameter() {
        let url = format!("http://a.test/shop;jsessionid={}", SESSION);
        assert_eq!(remove_session_id(&url), "http://a.test/shop");
    }

    #[test]
    fn test_remove_session_query_parameter() {
        let url = format!("http://a.test/page?sid={}&q=rust", SESSION);
        assert_eq!(remove_session_id(&url), "http://a.test/page?q=rust");

        let url = format!("http://a.test/page?q=rust&PHPSESSID={}", SESSION);
        assert_eq!(remove_session_id(&url), "http://a.test/page?q=rust");

        let url = format!("http://a.test/page?sessionid={}", SESSION);
        assert_eq!(remove_session_id(&url), "http://a.test/page");
    }

    #[test]
    fn test_short_ids_are_kept() {
        let url = "http://a.test/page?s=short";
        assert_eq!(remove_session_id(url), url);
    }

    #[test]
    fn test_rewrite_rules_apply_in_order() {
        let mut cleaner = UrlCleaner::new(false);
        cleaner.add_rule("/print/", "/");
        cleaner.add_rule("^http://", "https://");
        assert_eq!(
            cleaner.clean("http://a.test/print/article"),
            "https://a.test/article"
        );
    }

    #[test]
    fn test_bad_rule_is_skipped() {
        let mut cleaner = UrlCleaner::new(false);
        cleaner.add_rule("(unclosed", "");
        cleaner.add_rule("/amp$", "");
        assert_eq!(cleaner.rule_count(), 2);
        assert_eq!(cleaner.clean("http://a.test/story/amp"), "http://a.test/story");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut cleaner = UrlCleaner::new(true);
        cleaner.add_rule("/index\\.html$", "/");

        let urls = [
            "http://a.test/".to_string(),
            "http://a.test/x#frag".to_string(),
            "http://a.test/x?y=1#z".to_string(),
            "http://a.test/dir/index.html".to_string(),
            format!("http://a.test/shop;jsessionid={}?a=1", SESSION),
            "  http://a.test/padded  ".to_string(),
        ];

        for url in &urls {
            let once = cleaner.clean(url);
            assert_eq!(cleaner.clean(&once), once, "not idempotent for {}", url);
        }
    }

    #[test]
    fn test_dangling_query_before_fragment() {
        let cleaner = UrlCleaner::new(false);

        let urls = [
            "http://a.test/p?#top".to_string(),
            format!("http://a.test/p?sid={}#frag", SESSION),
            format!("http://a.test/p?sid={}&#frag", SESSION),
            "http://a.test/p?q=1#frag".to_string(),
        ];
        for url in &urls {
            let once = cleaner.clean(url);
            assert_eq!(cleaner.clean(&once), once, "not idempotent for {}", url);
        }

        assert_eq!(cleaner.clean("http://a.test/p?#top"), "http://a.test/p");
        assert_eq!(
            cleaner.clean(&format!("http://a.test/p?sid={}#frag", SESSION)),
            "http://a.test/p"
        );
        assert_eq!(cleaner.clean("http://a.test/p?q=1#frag"), "http://a.test/p?q=1");
    }
}
