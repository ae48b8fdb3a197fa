//! Crawler module for page fetching and crawl coordination
//!
//! This module contains the core crawling logic, including:
//! - The [`Fetcher`] contract, an HTTP implementation and a cascading fallback chain
//! - HTML link extraction scoped to in-domain, sub-domain and out-of-domain links
//! - The [`Crawler`] dispatcher driving a bounded pool of workers

mod cascade;
mod coordinator;
mod fetcher;
mod parser;

pub use cascade::{CascadingFetcher, DocumentCheck, FetcherHealth, FetcherState, PauseRule};
pub use coordinator::{
    CrawlEvent, Crawler, DocumentCallback, ErrorCallback, FileTypeHandler, FinishCallback,
    StopHandle,
};
pub use fetcher::{
    build_http_client, user_agent_string, Document, FetchError, Fetcher, HttpFetcher,
    ThrottledFetcher,
};
pub use parser::{HtmlLinkExtractor, LinkExtractor, LinkScope};
