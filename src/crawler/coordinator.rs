//! Crawler coordinator - main crawl orchestration logic
//!
//! [`Crawler`] holds the configuration and collaborators of a crawl. Each call
//! to [`Crawler::start`] creates a fresh [`CrawlSession`], spawns `max_threads`
//! worker tasks over its frontier and supervises them until one of the stop
//! triggers fires:
//! - the frontier is empty and no worker is in flight
//! - the visit budget (`stop_count`) is used up
//! - [`StopHandle::stop`] was called
//! - no fetch succeeded for the silent-stop duration
//!
//! Per URL a worker holds the throttle, diverts registered file types to their
//! handler, fetches the document, runs the callbacks, and offers every cleaned
//! and accepted link back to the frontier. Failed URLs may be re-queued a
//! bounded number of times.

use crate::config::Config;
use crate::crawler::{
    Document, FetchError, Fetcher, HtmlLinkExtractor, HttpFetcher, LinkExtractor, LinkScope,
};
use crate::output::CrawlReport;
use crate::state::{CrawlSession, CrawlState, StopReason};
use crate::throttle::{Throttle, ThrottlePolicy};
use crate::url::{file_type, parse_crawl_url, DownloadFilter, UrlCleaner, UrlRules};
use crate::{ConfigResult, Result, SkeinError};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinSet;

/// Called with every successfully fetched document
pub type DocumentCallback = Arc<dyn Fn(&Document) + Send + Sync>;

/// Called with a URL whose retrieval failed for good
pub type ErrorCallback = Arc<dyn Fn(&str, &FetchError) + Send + Sync>;

/// Called once with the final report
pub type FinishCallback = Arc<dyn Fn(&CrawlReport) + Send + Sync>;

/// Receives URLs of a registered file type instead of the fetcher
pub type FileTypeHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Events published to [`Crawler::subscribe`] receivers
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Started { seeds: usize, workers: usize },
    DocumentFetched(Document),
    FetchFailed { url: String, error: FetchError, requeued: bool },
    FileTypeHandled { url: String, file_type: String },
    Finished { reason: StopReason, visited: usize },
}

#[derive(Debug, Default)]
struct Control {
    cancelled: AtomicBool,
    wake: Notify,
}

/// Cloneable handle that stops a running crawl from anywhere
///
/// Stopping sets the visit budget to zero: no further URL is dispatched and
/// results of fetches still in flight are discarded.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    pub fn stop(&self) {
        if !self.control.cancelled.swap(true, Ordering::SeqCst) {
            tracing::info!("Stop requested");
        }
        self.control.wake.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.control.cancelled.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.control.cancelled.store(false, Ordering::SeqCst);
    }

    async fn notified(&self) {
        self.control.wake.notified().await;
    }
}

#[derive(Clone, Default)]
struct Callbacks {
    documents: Vec<DocumentCallback>,
    errors: Vec<ErrorCallback>,
    finish: Vec<FinishCallback>,
    file_types: HashMap<String, FileTypeHandler>,
}

/// Main crawler structure
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    link_extractor: Arc<dyn LinkExtractor>,
    throttle: ThrottlePolicy,
    cleaner: UrlCleaner,
    rules: UrlRules,
    allowed_domains: Vec<String>,
    max_threads: usize,
    stop_count: i64,
    silent_stop: Duration,
    poll_interval: Duration,
    shutdown_grace: Duration,
    retry_failed: bool,
    max_retries: u32,
    keep_snapshot: bool,
    callbacks: Callbacks,
    subscribers: Mutex<Vec<UnboundedSender<CrawlEvent>>>,
    stop: StopHandle,
}

impl Crawler {
    /// Creates a crawler around a fetcher with default settings
    ///
    /// Defaults: 4 workers, no visit limit, 10 minute silent stop, 1 second
    /// poll interval, failed URLs retried up to 3 times, query strings
    /// stripped, URLs limited to 400 characters, no throttling.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            link_extractor: Arc::new(HtmlLinkExtractor::new()),
            throttle: ThrottlePolicy::default(),
            cleaner: UrlCleaner::new(true),
            rules: UrlRules::default(),
            allowed_domains: Vec::new(),
            max_threads: 4,
            stop_count: -1,
            silent_stop: Duration::from_secs(10 * 60),
            poll_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(30),
            retry_failed: true,
            max_retries: 3,
            keep_snapshot: false,
            callbacks: Callbacks::default(),
            subscribers: Mutex::new(Vec::new()),
            stop: StopHandle::default(),
        }
    }

    /// Builds a crawler with an [`HttpFetcher`] and every setting from `config`
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to `start`
    /// * `Err(SkeinError)` - The HTTP client could not be built or a pattern is invalid
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, &config.fetch)?;
        let mut crawler = Self::new(Arc::new(fetcher));
        crawler.apply_config(config)?;
        Ok(crawler)
    }

    /// Applies every setting of `config` except the fetcher
    pub fn apply_config(&mut self, config: &Config) -> ConfigResult<()> {
        let settings = &config.crawler;
        self.set_max_threads(settings.max_threads);
        self.set_stop_count(settings.stop_count);
        self.set_silent_stop_minutes(settings.silent_stop_minutes);
        self.set_poll_interval(Duration::from_millis(settings.poll_interval_ms));
        self.set_retry_failed(settings.retry_failed);
        self.set_max_retries(settings.max_retries);
        self.set_strip_query_params(settings.strip_query_params);
        self.rules.set_max_length(settings.max_url_length);
        self.set_link_extractor(Arc::new(HtmlLinkExtractor::with_nofollow(
            settings.respect_nofollow,
        )));
        self.throttle = ThrottlePolicy::from_config(&config.throttle)?;

        let filter = &config.filter;
        self.rules.set_download_filter(DownloadFilter::with_lists(
            &filter.file_type_whitelist,
            &filter.file_type_blacklist,
        ));
        for pattern in &filter.url_whitelist {
            self.add_whitelist_url_pattern(pattern)?;
        }
        for pattern in &filter.url_blacklist {
            self.add_blacklist_url_pattern(pattern)?;
        }
        for domain in &filter.allowed_domains {
            self.add_allowed_out_of_scope_domain(domain);
        }
        for rule in &filter.rewrite {
            self.add_url_rewrite_rule(&rule.pattern, &rule.replacement);
        }

        Ok(())
    }

    pub fn set_fetcher(&mut self, fetcher: Arc<dyn Fetcher>) {
        self.fetcher = fetcher;
    }

    pub fn set_link_extractor(&mut self, extractor: Arc<dyn LinkExtractor>) {
        self.link_extractor = extractor;
    }

    /// Uses one throttle for every request
    pub fn set_throttle(&mut self, throttle: Arc<dyn Throttle>) {
        self.throttle = ThrottlePolicy::Global(throttle);
    }

    pub fn set_throttle_policy(&mut self, policy: ThrottlePolicy) {
        self.throttle = policy;
    }

    /// Number of concurrent workers; zero is rejected by `start`
    pub fn set_max_threads(&mut self, max_threads: usize) {
        self.max_threads = max_threads;
    }

    /// Maximum number of URLs to visit; negative means unlimited
    pub fn set_stop_count(&mut self, stop_count: i64) {
        self.stop_count = stop_count;
    }

    /// Stops the crawl after this many minutes without a successful fetch
    ///
    /// Zero is rejected by `start`.
    pub fn set_silent_stop_minutes(&mut self, minutes: u64) {
        self.silent_stop = Duration::from_secs(minutes.saturating_mul(60));
    }

    pub fn set_silent_stop(&mut self, silent_stop: Duration) {
        self.silent_stop = silent_stop;
    }

    /// Upper bound on how long an idle worker or the supervisor sleeps between checks
    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        self.poll_interval = poll_interval;
    }

    /// How long `start` waits for in-flight workers once the crawl has stopped
    pub fn set_shutdown_grace(&mut self, grace: Duration) {
        self.shutdown_grace = grace;
    }

    pub fn set_retry_failed(&mut self, retry_failed: bool) {
        self.retry_failed = retry_failed;
    }

    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    pub fn set_strip_query_params(&mut self, strip: bool) {
        self.cleaner.set_strip_query_params(strip);
    }

    pub fn set_download_filter(&mut self, filter: DownloadFilter) {
        self.rules.set_download_filter(filter);
    }

    /// Keeps a copy of the frontier in the report
    pub fn set_keep_snapshot(&mut self, keep: bool) {
        self.keep_snapshot = keep;
    }

    /// Adds a regex a followed URL must match (any one of them, once any are set)
    pub fn add_whitelist_url_pattern(&mut self, pattern: &str) -> ConfigResult<()> {
        self.rules.add_whitelist_pattern(pattern)
    }

    /// Adds a regex a followed URL must not match
    pub fn add_blacklist_url_pattern(&mut self, pattern: &str) -> ConfigResult<()> {
        self.rules.add_blacklist_pattern(pattern)
    }

    /// Follows links to `domain` even when outside the crawl scope (`*.x` allowed)
    pub fn add_allowed_out_of_scope_domain(&mut self, domain: &str) {
        self.allowed_domains.push(domain.trim().to_string());
    }

    pub fn add_url_rewrite_rule(&mut self, pattern: &str, replacement: &str) {
        self.cleaner.add_rule(pattern, replacement);
    }

    /// Runs `callback` on the worker for every fetched document
    ///
    /// Callbacks run inline on worker tasks and must not block for long.
    pub fn on_document_fetched<F>(&mut self, callback: F)
    where
        F: Fn(&Document) + Send + Sync + 'static,
    {
        self.callbacks.documents.push(Arc::new(callback));
    }

    /// Runs `callback` for every URL that failed and will not be retried
    pub fn on_fetch_error<F>(&mut self, callback: F)
    where
        F: Fn(&str, &FetchError) + Send + Sync + 'static,
    {
        self.callbacks.errors.push(Arc::new(callback));
    }

    pub fn on_finish<F>(&mut self, callback: F)
    where
        F: Fn(&CrawlReport) + Send + Sync + 'static,
    {
        self.callbacks.finish.push(Arc::new(callback));
    }

    /// Diverts URLs with the given file type to `handler` instead of fetching them
    pub fn register_file_type_handler<F>(&mut self, file_type: &str, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let key = file_type.trim().trim_start_matches('.').to_lowercase();
        self.callbacks.file_types.insert(key, Arc::new(handler));
    }

    /// Returns a receiver for the events of the next crawl
    ///
    /// The channel closes once that crawl has finished.
    pub fn subscribe(&self) -> UnboundedReceiver<CrawlEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Crawls from `seeds` until a stop trigger fires
    ///
    /// Seeds are cleaned like extracted links. The scope flags choose which
    /// links are followed relative to the page they appear on.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl ran and stopped
    /// * `Err(SkeinError::InvalidConfiguration)` - Zero workers, zero silent stop, or no seed
    /// * `Err(SkeinError::Url)` - A seed is not an http(s) URL
    pub async fn start<I, S>(
        &self,
        seeds: I,
        in_domain: bool,
        out_domain: bool,
        sub_domain: bool,
    ) -> Result<CrawlReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.max_threads == 0 {
            return Err(SkeinError::InvalidConfiguration(
                "max_threads must be at least 1".to_string(),
            ));
        }
        if self.silent_stop.is_zero() {
            return Err(SkeinError::InvalidConfiguration(
                "silent stop must be longer than zero".to_string(),
            ));
        }

        let seeds: HashSet<String> = seeds
            .into_iter()
            .map(|seed| self.cleaner.clean(seed.as_ref()))
            .filter(|seed| !seed.is_empty())
            .collect();
        if seeds.is_empty() {
            return Err(SkeinError::InvalidConfiguration(
                "at least one seed URL is required".to_string(),
            ));
        }
        for seed in &seeds {
            parse_crawl_url(seed)?;
        }

        self.stop.reset();
        let started_at = Utc::now();
        let run = Arc::new(self.prepare_run(LinkScope {
            in_domain,
            out_domain,
            sub_domain,
            allowed_domains: self.allowed_domains.clone(),
        }));

        let seed_count = seeds.len();
        run.session.frontier.seed(seeds);
        run.session.transition(CrawlState::Running);
        tracing::info!(
            "Starting crawl with {} seed URLs and {} workers",
            seed_count,
            self.max_threads
        );
        run.emit(CrawlEvent::Started {
            seeds: seed_count,
            workers: self.max_threads,
        });

        let mut workers = JoinSet::new();
        for id in 0..self.max_threads {
            workers.spawn(Arc::clone(&run).worker_loop(id));
        }

        let reason = run.supervise().await;
        run.session.transition(CrawlState::Stopped);
        run.session.frontier.wake_all();
        tracing::info!("Crawl stopped: {}", reason);

        self.drain_workers(&mut workers).await;

        let frontier = &run.session.frontier;
        let report = CrawlReport {
            reason,
            visited: frontier.visited_count(),
            pending: frontier.pending_count(),
            counters: run.session.counters.snapshot(),
            started_at,
            finished_at: Utc::now(),
            elapsed: run.session.elapsed(),
            snapshot: self.keep_snapshot.then(|| frontier.snapshot()),
        };

        for callback in &self.callbacks.finish {
            callback(&report);
        }
        run.emit(CrawlEvent::Finished {
            reason,
            visited: report.visited,
        });
        run.close_events();

        Ok(report)
    }

    fn prepare_run(&self, scope: LinkScope) -> CrawlRun {
        let subscribers = std::mem::take(
            &mut *self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        CrawlRun {
            session: CrawlSession::new(),
            fetcher: Arc::clone(&self.fetcher),
            link_extractor: Arc::clone(&self.link_extractor),
            throttle: self.throttle.clone(),
            cleaner: self.cleaner.clone(),
            rules: self.rules.clone(),
            scope,
            stop: self.stop.clone(),
            stop_count: self.stop_count,
            silent_stop: self.silent_stop,
            poll_interval: self.poll_interval,
            retry_failed: self.retry_failed,
            max_retries: self.max_retries,
            callbacks: self.callbacks.clone(),
            events: Mutex::new(subscribers),
        }
    }

    async fn drain_workers(&self, workers: &mut JoinSet<()>) {
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!("Worker ended abnormally: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "{} workers still busy after {:?}, abandoning them",
                workers.len(),
                self.shutdown_grace
            );
            workers.abort_all();
        }
    }
}

/// Everything the workers of one `start` call share
struct CrawlRun {
    session: CrawlSession,
    fetcher: Arc<dyn Fetcher>,
    link_extractor: Arc<dyn LinkExtractor>,
    throttle: ThrottlePolicy,
    cleaner: UrlCleaner,
    rules: UrlRules,
    scope: LinkScope,
    stop: StopHandle,
    stop_count: i64,
    silent_stop: Duration,
    poll_interval: Duration,
    retry_failed: bool,
    max_retries: u32,
    callbacks: Callbacks,
    events: Mutex<Vec<UnboundedSender<CrawlEvent>>>,
}

impl CrawlRun {
    /// Effective visit budget; zero once a stop was requested
    fn budget(&self) -> Option<usize> {
        if self.stop.is_stopped() {
            Some(0)
        } else {
            usize::try_from(self.stop_count).ok()
        }
    }

    /// Whether results of in-flight work should be thrown away
    fn discarding(&self) -> bool {
        self.stop.is_stopped() || self.session.is_stopped()
    }

    fn emit(&self, event: CrawlEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        // receivers that were dropped are forgotten
        events.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn close_events(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the stop trigger that currently holds, if any
    fn stop_reason(&self) -> Option<StopReason> {
        if self.stop.is_stopped() {
            return Some(StopReason::Cancelled);
        }

        let frontier = &self.session.frontier;
        if let Some(limit) = self.budget() {
            if frontier.visited_count() >= limit && frontier.in_flight_count() == 0 {
                return Some(StopReason::StopCount);
            }
        }
        if frontier.is_quiescent() {
            return Some(StopReason::Exhausted);
        }
        if self.session.since_last_success() >= self.silent_stop {
            return Some(StopReason::SilentTimeout);
        }
        None
    }

    /// Waits for the first stop trigger, waking on frontier changes and stop requests
    async fn supervise(&self) -> StopReason {
        let frontier = &self.session.frontier;
        loop {
            let changed = frontier.changed();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if let Some(reason) = self.stop_reason() {
                return reason;
            }

            let next = if frontier.is_empty() {
                CrawlState::Draining
            } else {
                CrawlState::Running
            };
            self.session.transition(next);

            tokio::select! {
                _ = tokio::time::timeout(self.poll_interval, changed) => {}
                _ = self.stop.notified() => {}
            }
        }
    }

    async fn worker_loop(self: Arc<Self>, id: usize) {
        tracing::trace!("Worker {} started", id);

        let frontier = &self.session.frontier;
        loop {
            let changed = frontier.changed();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if self.session.is_stopped() {
                break;
            }
            let Some(url) = frontier.claim(self.budget()) else {
                let _ = tokio::time::timeout(self.poll_interval, changed).await;
                continue;
            };

            self.session.counters.record_dispatched();
            tracing::debug!("Worker {} processing {}", id, url);

            // a panic in a callback or collaborator only loses this URL
            let task = tokio::spawn(Arc::clone(&self).process(url.clone()));
            if let Err(e) = task.await {
                tracing::error!("Processing {} failed: {}", url, e);
                self.session.counters.record_failed();
            }

            frontier.release();
        }

        tracing::trace!("Worker {} finished", id);
    }

    async fn process(self: Arc<Self>, url: String) {
        self.throttle.hold_for(&url).await;
        if self.discarding() {
            return;
        }

        let kind = file_type(&url);
        if let Some(handler) = self.callbacks.file_types.get(&kind) {
            tracing::debug!("Handing {} to the {} handler", url, kind);
            handler(&url);
            self.session.counters.record_handled_by_file_type();
            self.emit(CrawlEvent::FileTypeHandled {
                url,
                file_type: kind,
            });
            return;
        }

        match self.fetcher.fetch(&url).await {
            Ok(document) => self.handle_document(&url, document),
            Err(err) => self.handle_failure(&url, err),
        }
    }

    fn handle_document(&self, url: &str, document: Document) {
        if self.discarding() {
            tracing::debug!("Discarding {} fetched after stop", url);
            return;
        }

        self.session.mark_success();
        for callback in &self.callbacks.documents {
            callback(&document);
        }

        let mut added = 0;
        for link in self.link_extractor.extract_links(&document, &self.scope) {
            let cleaned = self.cleaner.clean(&link);
            let verdict = self.rules.verdict(&cleaned);
            if !verdict.is_accepted() {
                tracing::trace!("Rejected {} ({:?})", cleaned, verdict);
                self.session.counters.record_rejected();
                continue;
            }
            if self.session.frontier.add(&cleaned, url) {
                added += 1;
            }
        }
        tracing::debug!("{} yielded {} new URLs", url, added);

        let counters = self.session.counters.snapshot();
        if counters.succeeded % 10 == 0 {
            let elapsed = self.session.elapsed();
            let rate = counters.succeeded as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages fetched, {} pending, {:.2} pages/sec",
                counters.succeeded,
                self.session.frontier.pending_count(),
                rate
            );
        }

        self.emit(CrawlEvent::DocumentFetched(document));
    }

    fn handle_failure(&self, url: &str, err: FetchError) {
        if self.discarding() {
            tracing::debug!("Discarding failure of {} after stop: {}", url, err);
            return;
        }

        self.session.counters.record_failed();

        let requeued = self.retry_failed
            && err.is_transient()
            && self.rules.download_filter().is_accepted(url)
            && self.session.frontier.requeue(url, self.max_retries);

        if requeued {
            self.session.counters.record_requeued();
            tracing::debug!("Re-queued {} after {}", url, err);
        } else {
            tracing::warn!("Failed to fetch {}: {}", url, err);
            for callback in &self.callbacks.errors {
                callback(url, &err);
            }
        }

        self.emit(CrawlEvent::FetchFailed {
            url: url.to_string(),
            error: err,
            requeued,
        });
    }
}
