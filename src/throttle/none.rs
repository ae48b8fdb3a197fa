use super::Throttle;
use async_trait::async_trait;

/// A throttle that never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn hold(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_hold_returns_immediately() {
        let throttle = NoThrottle;
        let start = Instant::now();
        for _ in 0..1000 {
            throttle.hold().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
