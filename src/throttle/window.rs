use super::Throttle;
use crate::{ConfigError, ConfigResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sliding time-window throttle
///
/// Issues at most `max_requests` permits within any trailing window of length
/// `window`. The permit log is guarded by a fair (FIFO) async mutex which the
/// waiting caller keeps while it sleeps, so blocked callers are served in
/// arrival order and none of them starves.
#[derive(Debug)]
pub struct TimeWindowThrottle {
    max_requests: usize,
    window: Duration,
    permits: Mutex<VecDeque<Instant>>,
}

impl TimeWindowThrottle {
    /// Creates a throttle; zero requests or a zero window is a configuration error
    pub fn new(max_requests: u32, window: Duration) -> ConfigResult<Self> {
        if max_requests == 0 {
            return Err(ConfigError::Throttle(
                "time window throttle needs max_requests >= 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(ConfigError::Throttle(
                "time window throttle needs a non-zero window".to_string(),
            ));
        }

        Ok(Self {
            max_requests: max_requests as usize,
            window,
            permits: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
        })
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits for the next permit and returns the instant it was issued
    pub async fn acquire(&self) -> Instant {
        let mut permits = self.permits.lock().await;

        loop {
            let now = Instant::now();
            while permits
                .front()
                .is_some_and(|issued| now.duration_since(*issued) >= self.window)
            {
                permits.pop_front();
            }

            if permits.len() < self.max_requests {
                permits.push_back(now);
                return now;
            }

            // the oldest permit leaves the window first
            if let Some(oldest) = permits.front() {
                let wait = self.window.saturating_sub(now.duration_since(*oldest));
                tracing::trace!("Window full, waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[async_trait]
impl Throttle for TimeWindowThrottle {
    async fn hold(&self) {
        self.acquire().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_pathological_configurations_rejected() {
        assert!(TimeWindowThrottle::new(0, Duration::from_secs(1)).is_err());
        assert!(TimeWindowThrottle::new(3, Duration::ZERO).is_err());
    }

    #[tokio::test]
    async fn test_burst_up_to_limit_is_immediate() {
        let throttle = TimeWindowThrottle::new(5, Duration::from_secs(10)).unwrap();
        let start = Instant::now();
        for _ in 0..5 {
            throttle.hold().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_no_window_exceeds_limit_under_contention() {
        let max_requests = 3;
        let window = Duration::from_millis(100);
        let throttle = Arc::new(TimeWindowThrottle::new(max_requests, window).unwrap());

        let mut handles = Vec::new();
        for _ in 0..(3 * max_requests) {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move { throttle.acquire().await }));
        }

        let mut permits = Vec::new();
        for handle in handles {
            permits.push(handle.await.unwrap());
        }
        permits.sort();

        assert_eq!(permits.len(), 9);

        // any max_requests + 1 consecutive permits must span at least one window
        let n = max_requests as usize;
        for i in 0..permits.len() - n {
            assert!(
                permits[i + n].duration_since(permits[i]) >= window,
                "permits {} and {} are closer than the window",
                i,
                i + n
            );
        }
    }
}
