//! Output module for crawl reports
//!
//! The crawler returns a [`CrawlReport`] when it stops; this module prints it
//! for humans or serializes it as JSON.

pub mod stats;

pub use stats::{print_report, report_to_json, CrawlReport};
