//! The shared URL frontier
//!
//! Holds the URLs waiting to be fetched (`pending`) and the URLs already handed
//! to a worker (`visited`). Both sets live behind one mutex so that a URL moves
//! from `pending` to `visited` atomically and is never present in both.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct FrontierInner {
    pending: HashSet<String>,
    visited: HashSet<String>,
    /// url -> page it was discovered on
    sources: HashMap<String, String>,
    /// url -> how often it was put back after failing
    retries: HashMap<String, u32>,
    /// URLs claimed by workers that have not been released yet
    in_flight: usize,
}

/// Serializable copy of the frontier's two sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrontierSnapshot {
    pub pending: Vec<String>,
    pub visited: Vec<String>,
}

/// Concurrent URL frontier with deduplication
///
/// URLs must be cleaned before they are offered; the frontier compares them
/// verbatim. Every operation is safe to call from many workers at once.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    changed: Notify,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces all state with the given pending URLs
    pub fn seed<I, S>(&self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut inner = self.lock();
            *inner = FrontierInner::default();
            inner.pending.extend(urls.into_iter().map(Into::into));
            tracing::trace!("Frontier seeded with {} URLs", inner.pending.len());
        }
        self.changed.notify_waiters();
    }

    /// Adds a URL unless it is already pending or visited
    ///
    /// Returns true if the URL was newly queued.
    pub fn add(&self, url: &str, source_url: &str) -> bool {
        let added = {
            let mut inner = self.lock();
            if inner.visited.contains(url) || inner.pending.contains(url) {
                false
            } else {
                inner.pending.insert(url.to_string());
                if !source_url.is_empty() {
                    inner
                        .sources
                        .insert(url.to_string(), source_url.to_string());
                }
                true
            }
        };

        if added {
            self.changed.notify_waiters();
        }
        added
    }

    /// Removes one pending URL and records it as visited
    ///
    /// Returns None if nothing is pending. No two callers receive the same URL.
    pub fn take(&self) -> Option<String> {
        let mut inner = self.lock();
        Self::take_locked(&mut inner)
    }

    fn take_locked(inner: &mut FrontierInner) -> Option<String> {
        let url = inner.pending.iter().next().cloned()?;
        inner.pending.remove(&url);
        inner.visited.insert(url.clone());
        Some(url)
    }

    /// Takes a URL on behalf of a worker and counts it as in flight
    ///
    /// Refuses (returns None) once `budget` URLs have been visited. The budget
    /// check and the move to `visited` happen under the same lock, so concurrent
    /// claims never overshoot it. Every successful claim must be paired with
    /// [`release`](Self::release).
    pub fn claim(&self, budget: Option<usize>) -> Option<String> {
        let mut inner = self.lock();
        if budget.is_some_and(|limit| inner.visited.len() >= limit) {
            return None;
        }

        let url = Self::take_locked(&mut inner)?;
        inner.in_flight += 1;
        Some(url)
    }

    /// Marks one claimed URL as finished
    pub fn release(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Puts a visited URL back on the frontier after a failed retrieval
    ///
    /// Bypasses the visited check of [`add`](Self::add): the URL leaves
    /// `visited` and re-enters `pending`. Each URL may be put back at most
    /// `max_retries` times; returns false once that is exhausted.
    pub fn requeue(&self, url: &str, max_retries: u32) -> bool {
        let requeued = {
            let mut inner = self.lock();
            let attempts = inner.retries.get(url).copied().unwrap_or(0);
            if attempts >= max_retries || inner.pending.contains(url) {
                false
            } else {
                inner.retries.insert(url.to_string(), attempts + 1);
                inner.visited.remove(url);
                inner.pending.insert(url.to_string());
                true
            }
        };

        if requeued {
            self.changed.notify_waiters();
        }
        requeued
    }

    /// A future that completes on the next change to the frontier
    ///
    /// Call `enable` on the pinned future before re-checking a condition so a
    /// change in between is not missed.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Waits until the frontier changes or `timeout` elapses
    pub async fn wait_for_change(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.changed.notified()).await;
    }

    /// Wakes every task blocked in [`wait_for_change`](Self::wait_for_change)
    pub fn wake_all(&self) {
        self.changed.notify_waiters();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight
    }

    /// Nothing pending and nothing in flight, checked atomically
    pub fn is_quiescent(&self) -> bool {
        let inner = self.lock();
        inner.pending.is_empty() && inner.in_flight == 0
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.lock().pending.contains(url)
    }

    /// The page a URL was discovered on, if it was added with one
    pub fn source_of(&self, url: &str) -> Option<String> {
        self.lock().sources.get(url).cloned()
    }

    /// How often a URL was put back after failing
    pub fn retry_count(&self, url: &str) -> u32 {
        self.lock().retries.get(url).copied().unwrap_or(0)
    }

    /// Copies both sets, sorted
    pub fn snapshot(&self) -> FrontierSnapshot {
        let inner = self.lock();
        let mut pending: Vec<String> = inner.pending.iter().cloned().collect();
        let mut visited: Vec<String> = inner.visited.iter().cloned().collect();
        pending.sort();
        visited.sort();
        FrontierSnapshot { pending, visited }
    }
}
