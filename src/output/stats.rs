//! Crawl report generation and display
//!
//! This module provides the summary returned by `Crawler::start` and the
//! functions that print it as text or JSON.

use crate::state::{CounterSnapshot, FrontierSnapshot, StopReason};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Summary of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    /// The trigger that stopped the crawl
    pub reason: StopReason,

    /// URLs in the visited set when the crawl stopped
    pub visited: usize,

    /// URLs still pending when the crawl stopped
    pub pending: usize,

    /// Outcome counters
    pub counters: CounterSnapshot,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration of the crawl
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,

    /// The frontier at stop time, when retained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<FrontierSnapshot>,
}

fn serialize_secs<S: serde::Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(elapsed.as_secs_f64())
}

impl CrawlReport {
    /// Fetched documents per second over the whole crawl
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.counters.succeeded as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of dispatched URLs that produced a document, in percent
    pub fn success_rate(&self) -> f64 {
        if self.counters.dispatched > 0 {
            (self.counters.succeeded as f64 / self.counters.dispatched as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Serializes the report as pretty-printed JSON
pub fn report_to_json(report: &CrawlReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Overview:");
    println!("  Stopped because: {}", report.reason);
    println!("  Started: {}", report.started_at.to_rfc3339());
    println!("  Finished: {}", report.finished_at.to_rfc3339());
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!();

    println!("Frontier:");
    println!("  Visited: {}", report.visited);
    println!("  Pending: {}", report.pending);
    println!();

    let counters = &report.counters;
    println!("Outcomes:");
    println!("  Dispatched: {}", counters.dispatched);
    println!("  Succeeded: {}", counters.succeeded);
    println!("  Failed: {}", counters.failed);
    println!("  Re-queued: {}", counters.requeued);
    println!("  Links rejected: {}", counters.rejected);
    if counters.handled_by_file_type > 0 {
        println!("  Handled by file type: {}", counters.handled_by_file_type);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} dispatched), {:.2} pages/sec",
        report.success_rate(),
        counters.succeeded,
        counters.dispatched,
        report.pages_per_second()
    );
}
