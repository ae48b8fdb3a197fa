//! Per-crawl session state
//!
//! A [`CrawlSession`] is created by every call to `Crawler::start` and owns
//! everything that changes while the crawl runs: the frontier, the outcome
//! counters, the state machine and the time of the last successful fetch.

use super::{CrawlState, Frontier};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Outcome counters shared by all workers of one crawl
#[derive(Debug, Default)]
pub struct CrawlCounters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    requeued: AtomicU64,
    rejected: AtomicU64,
    handled_by_file_type: AtomicU64,
}

/// Plain copy of [`CrawlCounters`] at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// URLs handed to a worker
    pub dispatched: u64,
    /// Documents fetched successfully
    pub succeeded: u64,
    /// Fetches that failed, including ones later retried
    pub failed: u64,
    /// Failed URLs put back on the frontier
    pub requeued: u64,
    /// Extracted links dropped by the URL rules
    pub rejected: u64,
    /// URLs diverted to a file-type handler
    pub handled_by_file_type: u64,
}

impl CrawlCounters {
    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled_by_file_type(&self) {
        self.handled_by_file_type.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            handled_by_file_type: self.handled_by_file_type.load(Ordering::Relaxed),
        }
    }
}

/// Everything one crawl mutates while it runs
#[derive(Debug)]
pub struct CrawlSession {
    pub frontier: Frontier,
    pub counters: CrawlCounters,
    state: Mutex<CrawlState>,
    last_success: Mutex<Instant>,
    started: Instant,
}

impl Default for CrawlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlSession {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frontier: Frontier::new(),
            counters: CrawlCounters::default(),
            state: Mutex::new(CrawlState::Idle),
            last_success: Mutex::new(now),
            started: now,
        }
    }

    pub fn state(&self) -> CrawlState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the state machine to `next`
    ///
    /// Returns false and leaves the state untouched if the transition is not
    /// allowed (in particular, nothing leaves `Stopped`).
    pub fn transition(&self, next: CrawlState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == next {
            return true;
        }
        if !state.can_transition_to(next) {
            tracing::trace!("Ignoring transition {} -> {}", *state, next);
            return false;
        }

        tracing::debug!("Crawl state {} -> {}", *state, next);
        *state = next;
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.state().is_terminal()
    }

    /// Records a successful fetch and resets the silent-stop clock
    pub fn mark_success(&self) {
        self.counters.record_succeeded();
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last successful fetch (or since the session started)
    pub fn since_last_success(&self) -> Duration {
        self.last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
