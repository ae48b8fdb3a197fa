/// Dispatcher state definitions
///
/// A crawl moves through `Idle → Running → Draining → Stopped`. `Draining` and
/// `Running` alternate while workers are still in flight; `Stopped` is terminal.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    /// No seed URLs yet
    Idle,

    /// URLs are pending and workers are being dispatched
    Running,

    /// The frontier is empty but workers are still in flight
    Draining,

    /// Terminal: no further URLs are dispatched
    Stopped,
}

impl CrawlState {
    /// Returns true if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether a transition from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        match (self, next) {
            (Self::Stopped, _) => false,
            (_, Self::Stopped) => true,
            (Self::Idle, Self::Running) => true,
            (Self::Running, Self::Draining) | (Self::Draining, Self::Running) => true,
            (a, b) => *a == b,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a crawl reached `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The frontier ran dry and no worker was in flight
    Exhausted,

    /// The configured number of URLs was visited
    StopCount,

    /// `stop()` was called
    Cancelled,

    /// No fetch succeeded within the silent-stop time
    SilentTimeout,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::StopCount => "stop_count",
            Self::Cancelled => "cancelled",
            Self::SilentTimeout => "silent_timeout",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
