use super::Throttle;
use crate::{ConfigError, ConfigResult};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum gap between two successive permits
///
/// Callers are served one at a time in the order they arrived; each permit is
/// issued no earlier than `interval` after the previous one.
#[derive(Debug)]
pub struct FixedIntervalThrottle {
    interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl FixedIntervalThrottle {
    /// Creates a throttle; a zero interval is a configuration error
    pub fn new(interval: Duration) -> ConfigResult<Self> {
        if interval.is_zero() {
            return Err(ConfigError::Throttle(
                "fixed interval throttle needs a non-zero interval".to_string(),
            ));
        }

        Ok(Self {
            interval,
            last_permit: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next permit and returns the instant it was issued
    pub async fn acquire(&self) -> Instant {
        let mut last = self.last_permit.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }

        let now = Instant::now();
        *last = Some(now);
        now
    }
}

#[async_trait]
impl Throttle for FixedIntervalThrottle {
    async fn hold(&self) {
        self.acquire().await;
    }
}
