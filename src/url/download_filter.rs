use std::collections::HashSet;
use url::Url;

/// Allow/deny policy over URL file types
///
/// A URL is accepted when the whitelist is empty or contains its file type, and
/// the blacklist does not contain it. File types are compared lower-cased.
#[derive(Debug, Clone, Default)]
pub struct DownloadFilter {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
}

impl DownloadFilter {
    /// Creates a filter that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter from white- and blacklisted file types
    pub fn with_lists<W, B, S>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator<Item = S>,
        B: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            whitelist: whitelist
                .into_iter()
                .map(|s| normalize_file_type(s.as_ref()))
                .collect(),
            blacklist: blacklist
                .into_iter()
                .map(|s| normalize_file_type(s.as_ref()))
                .collect(),
        }
    }

    pub fn add_whitelisted(&mut self, file_type: &str) {
        self.whitelist.insert(normalize_file_type(file_type));
    }

    pub fn add_blacklisted(&mut self, file_type: &str) {
        self.blacklist.insert(normalize_file_type(file_type));
    }

    /// Whether the URL's file type may be fetched
    pub fn is_accepted(&self, url: &str) -> bool {
        let file_type = file_type(url);
        (self.whitelist.is_empty() || self.whitelist.contains(&file_type))
            && !self.blacklist.contains(&file_type)
    }
}

fn normalize_file_type(file_type: &str) -> String {
    file_type.trim().trim_start_matches('.').to_lowercase()
}

/// Derives the file type of a URL
///
/// The file type is the part after the last dot of the last path segment,
/// lower-cased, or an empty string when there is none. Query and fragment are
/// ignored. Strings that do not parse as URLs are treated as bare paths.
///
/// # Examples
///
/// ```
/// use skein::url::file_type;
///
/// assert_eq!(file_type("http://a.test/docs/Report.PDF?dl=1"), "pdf");
/// assert_eq!(file_type("http://a.test/"), "");
/// assert_eq!(file_type("page.html"), "html");
/// ```
pub fn file_type(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            let without_fragment = url.split('#').next().unwrap_or_default();
            without_fragment
                .split('?')
                .next()
                .unwrap_or_default()
                .to_string()
        }
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((_, extension)) => extension.to_lowercase(),
        None => String::new(),
    }
}
