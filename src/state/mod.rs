//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: pending and visited URL sets shared by all workers
//! - `CrawlState`: the dispatcher's state machine (`Idle → Running → Draining → Stopped`)
//! - `CrawlSession`: per-crawl frontier, counters and state, created by each `start`

mod crawl_state;
mod frontier;
mod session;

pub use crawl_state::{CrawlState, StopReason};
pub use frontier::{Frontier, FrontierSnapshot};
pub use session::{CounterSnapshot, CrawlCounters, CrawlSession};
