//! Cascading multi-fetcher
//!
//! Tries an ordered chain of fetchers per URL and stops at the first one that
//! returns a good document. Each fetcher may carry a [`PauseRule`]: once it has
//! failed `failing_threshold` times it is skipped for the next
//! `requests_to_skip` attempts, then its counters are reset and it is tried again.

use super::{Document, FetchError, Fetcher};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Circuit-breaker settings for one fetcher in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRule {
    pub failing_threshold: u32,
    pub requests_to_skip: u32,
}

/// Decides whether a fetched document is usable
///
/// Indicators are matched against the raw body. A good indicator wins over a
/// bad one; with neither present the body must be longer than
/// `min_text_length`. HTTP 403 responses are never good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCheck {
    pub bad_indicators: Vec<String>,
    pub good_indicators: Vec<String>,
    pub min_text_length: usize,
}

impl Default for DocumentCheck {
    fn default() -> Self {
        Self {
            bad_indicators: Vec::new(),
            good_indicators: Vec::new(),
            min_text_length: 500,
        }
    }
}

impl DocumentCheck {
    pub fn is_good(&self, document: &Document) -> bool {
        if document.status == 403 {
            return false;
        }

        let body = &document.body;
        if self
            .good_indicators
            .iter()
            .any(|indicator| body.contains(indicator.as_str()))
        {
            return true;
        }
        if self
            .bad_indicators
            .iter()
            .any(|indicator| body.contains(indicator.as_str()))
        {
            return false;
        }
        body.chars().count() > self.min_text_length
    }
}

/// Whether a fetcher is currently being tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherState {
    Active,
    Paused,
}

/// Request outcome counters for one fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetcherHealth {
    pub state: FetcherState,
    /// Failures since the last reset
    pub fail_count: u32,
    /// Attempts skipped while paused
    pub skip_count: u32,
    pub successes: u64,
}

impl Default for FetcherHealth {
    fn default() -> Self {
        Self {
            state: FetcherState::Active,
            fail_count: 0,
            skip_count: 0,
            successes: 0,
        }
    }
}

impl FetcherHealth {
    /// Decides whether the fetcher may be used for this attempt
    ///
    /// A fetcher over its failure threshold is skipped until it has skipped
    /// `requests_to_skip` attempts; the attempt after that resets both
    /// counters and goes through.
    fn admit(&mut self, rule: Option<PauseRule>) -> bool {
        let Some(rule) = rule else {
            return true;
        };
        if self.fail_count < rule.failing_threshold {
            return true;
        }

        if self.skip_count >= rule.requests_to_skip {
            self.fail_count = 0;
            self.skip_count = 0;
            self.state = FetcherState::Active;
            true
        } else {
            self.skip_count += 1;
            self.state = FetcherState::Paused;
            false
        }
    }

    fn record(&mut self, good: bool, rule: Option<PauseRule>) {
        if good {
            self.successes += 1;
        } else {
            self.fail_count += 1;
            if rule.is_some_and(|rule| self.fail_count >= rule.failing_threshold) {
                self.state = FetcherState::Paused;
            }
        }
    }
}

struct Stage {
    fetcher: Arc<dyn Fetcher>,
    rule: Option<PauseRule>,
}

/// Tries fetchers in priority order until one yields a good document
///
/// The returned document's `fetched_by` names the fetcher that produced it.
pub struct CascadingFetcher {
    name: String,
    stages: Vec<Stage>,
    check: DocumentCheck,
    health: Mutex<BTreeMap<String, FetcherHealth>>,
}

impl Default for CascadingFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CascadingFetcher {
    pub fn new() -> Self {
        Self {
            name: "cascade".to_string(),
            stages: Vec::new(),
            check: DocumentCheck::default(),
            health: Mutex::new(BTreeMap::new()),
        }
    }

    /// Appends a fetcher to the end of the chain
    pub fn push(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.add_stage(fetcher, None);
        self
    }

    /// Appends a fetcher that pauses itself after repeated failures
    pub fn push_with_pause(mut self, fetcher: Arc<dyn Fetcher>, rule: PauseRule) -> Self {
        self.add_stage(fetcher, Some(rule));
        self
    }

    fn add_stage(&mut self, fetcher: Arc<dyn Fetcher>, rule: Option<PauseRule>) {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fetcher.name().to_string(), FetcherHealth::default());
        self.stages.push(Stage { fetcher, rule });
    }

    pub fn with_check(mut self, check: DocumentCheck) -> Self {
        self.check = check;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Snapshot of every fetcher's counters, keyed by fetcher name
    pub fn tracker(&self) -> BTreeMap<String, FetcherHealth> {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn admit(&self, stage: &Stage) -> bool {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        health
            .entry(stage.fetcher.name().to_string())
            .or_default()
            .admit(stage.rule)
    }

    fn record(&self, stage: &Stage, good: bool) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        health
            .entry(stage.fetcher.name().to_string())
            .or_default()
            .record(good, stage.rule);
    }
}

#[async_trait]
impl Fetcher for CascadingFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let mut last_error = FetchError::Exhausted;

        for stage in &self.stages {
            let name = stage.fetcher.name();
            if !self.admit(stage) {
                tracing::debug!("Skipping paused fetcher {} for {}", name, url);
                continue;
            }

            let outcome = stage.fetcher.fetch(url).await;
            let good = outcome
                .as_ref()
                .is_ok_and(|document| self.check.is_good(document));
            self.record(stage, good);
            tracing::debug!(
                "Made request with {} to {} - good document: {}",
                name,
                url,
                good
            );

            match outcome {
                Ok(mut document) if good => {
                    document.fetched_by = Some(name.to_string());
                    return Ok(document);
                }
                Ok(_) => {
                    last_error = FetchError::BadDocument(format!("{} returned a bad document", name));
                }
                Err(err) => last_error = err,
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedFetcher {
        name: &'static str,
        body: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn ok(name: &'static str, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                body: Some(body),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                body: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.body {
                Some(body) => Ok(Document::html(url, body)),
                None => Err(FetchError::Network("connection reset".to_string())),
            }
        }
    }

    fn short_check() -> DocumentCheck {
        DocumentCheck {
            min_text_length: 5,
            ..DocumentCheck::default()
        }
    }

    #[test]
    fn test_document_check_order() {
        let check = DocumentCheck {
            bad_indicators: vec!["captcha".to_string()],
            good_indicators: vec!["product-price".to_string()],
            min_text_length: 10,
        };

        let good_and_bad = Document::html("u", "captcha product-price");
        assert!(check.is_good(&good_and_bad));

        let bad = Document::html("u", "please solve this captcha now");
        assert!(!check.is_good(&bad));

        assert!(!check.is_good(&Document::html("u", "tiny")));
        assert!(check.is_good(&Document::html("u", "long enough body")));

        let forbidden = Document {
            status: 403,
            ..Document::html("u", "product-price")
        };
        assert!(!check.is_good(&forbidden));
    }

    #[tokio::test]
    async fn test_first_good_document_wins() {
        let plain = ScriptedFetcher::ok("plain", "blocked");
        let render = ScriptedFetcher::ok("render", "a rendered page");
        let spare = ScriptedFetcher::ok("spare", "never used");

        let cascade = CascadingFetcher::new()
            .with_check(DocumentCheck {
                bad_indicators: vec!["blocked".to_string()],
                ..short_check()
            })
            .push(plain.clone())
            .push(render.clone())
            .push(spare.clone());

        let doc = cascade.fetch("http://a.test/").await.unwrap();
        assert_eq!(doc.fetched_by.as_deref(), Some("render"));
        assert_eq!(plain.calls(), 1);
        assert_eq!(render.calls(), 1);
        assert_eq!(spare.calls(), 0);

        let tracker = cascade.tracker();
        assert_eq!(tracker["plain"].fail_count, 1);
        assert_eq!(tracker["render"].successes, 1);
        assert_eq!(tracker["spare"], FetcherHealth::default());
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_error() {
        let cascade = CascadingFetcher::new()
            .with_check(short_check())
            .push(ScriptedFetcher::ok("plain", "x"))
            .push(ScriptedFetcher::failing("proxy"));

        let err = cascade.fetch("http://a.test/").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));

        let empty = CascadingFetcher::new();
        assert_eq!(
            empty.fetch("http://a.test/").await.unwrap_err(),
            FetchError::Exhausted
        );
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let flaky = ScriptedFetcher::failing("flaky");
        let backup = ScriptedFetcher::ok("backup", "backup content");
        let cascade = CascadingFetcher::new()
            .with_check(short_check())
            .push_with_pause(
                flaky.clone(),
                PauseRule {
                    failing_threshold: 2,
                    requests_to_skip: 3,
                },
            )
            .push(backup.clone());

        // two failures reach the threshold
        for _ in 0..2 {
            cascade.fetch("http://a.test/").await.unwrap();
        }
        assert_eq!(flaky.calls(), 2);
        assert_eq!(cascade.tracker()["flaky"].state, FetcherState::Paused);

        // the next three attempts skip it
        for _ in 0..3 {
            cascade.fetch("http://a.test/").await.unwrap();
        }
        assert_eq!(flaky.calls(), 2);
        assert_eq!(cascade.tracker()["flaky"].skip_count, 3);

        // then it is reset and tried again
        cascade.fetch("http://a.test/").await.unwrap();
        assert_eq!(flaky.calls(), 3);
        let health = cascade.tracker()["flaky"];
        assert_eq!(health.fail_count, 1);
        assert_eq!(health.skip_count, 0);
        assert_eq!(backup.calls(), 6);
    }
}
