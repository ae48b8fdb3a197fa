//! Request throttling
//!
//! A [`Throttle`] is consulted before every fetch and suspends the calling
//! worker until the request may go out. Three policies are provided:
//! - [`NoThrottle`]: never waits
//! - [`FixedIntervalThrottle`]: a minimum gap between two permits
//! - [`TimeWindowThrottle`]: at most N permits within any trailing window
//!
//! [`ThrottlePolicy`] scopes a policy either globally or per host.

mod fixed;
mod none;
mod window;

pub use fixed::FixedIntervalThrottle;
pub use none::NoThrottle;
pub use window::TimeWindowThrottle;

use crate::config::{ThrottleConfig, ThrottleKind};
use crate::url::host_of;
use crate::ConfigResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A rate-limiting gate consulted before each outbound request
///
/// Implementations must be safe to share between workers and must never fail:
/// invalid parameters are rejected when the throttle is constructed.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Returns once the next request from this throttle's scope may proceed
    async fn hold(&self);
}

#[async_trait]
impl<T: Throttle + ?Sized> Throttle for Arc<T> {
    async fn hold(&self) {
        (**self).hold().await
    }
}

/// Parameters of a throttle, used to build fresh instances on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleSpec {
    None,
    FixedInterval(Duration),
    TimeWindow { max_requests: u32, window: Duration },
}

impl ThrottleSpec {
    /// Builds a new throttle instance
    pub fn build(&self) -> ConfigResult<Arc<dyn Throttle>> {
        Ok(match *self {
            Self::None => Arc::new(NoThrottle),
            Self::FixedInterval(interval) => Arc::new(FixedIntervalThrottle::new(interval)?),
            Self::TimeWindow {
                max_requests,
                window,
            } => Arc::new(TimeWindowThrottle::new(max_requests, window)?),
        })
    }
}

impl From<&ThrottleConfig> for ThrottleSpec {
    fn from(config: &ThrottleConfig) -> Self {
        match config.kind {
            ThrottleKind::None => Self::None,
            ThrottleKind::Fixed => Self::FixedInterval(Duration::from_millis(config.interval_ms)),
            ThrottleKind::Window => Self::TimeWindow {
                max_requests: config.max_requests,
                window: Duration::from_millis(config.window_ms),
            },
        }
    }
}

/// One throttle per host, created lazily from a shared [`ThrottleSpec`]
///
/// URLs without a parseable host share a single fallback throttle.
pub struct HostThrottle {
    spec: ThrottleSpec,
    fallback: Arc<dyn Throttle>,
    hosts: Mutex<HashMap<String, Arc<dyn Throttle>>>,
}

impl HostThrottle {
    /// Creates the registry; fails if `spec` is not a valid throttle
    pub fn new(spec: ThrottleSpec) -> ConfigResult<Self> {
        Ok(Self {
            spec,
            fallback: spec.build()?,
            hosts: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the throttle responsible for `url`'s host
    pub fn for_url(&self, url: &str) -> Arc<dyn Throttle> {
        let Some(host) = host_of(url) else {
            return Arc::clone(&self.fallback);
        };

        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(throttle) = hosts.get(&host) {
            return Arc::clone(throttle);
        }

        // `new` already built this once, so it cannot fail here
        let throttle = self
            .spec
            .build()
            .unwrap_or_else(|_| Arc::clone(&self.fallback));
        hosts.insert(host, Arc::clone(&throttle));
        throttle
    }

    /// Number of hosts seen so far
    pub fn host_count(&self) -> usize {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// How the dispatcher throttles requests
#[derive(Clone)]
pub enum ThrottlePolicy {
    /// One throttle shared by every request
    Global(Arc<dyn Throttle>),
    /// A separate throttle per host
    PerHost(Arc<HostThrottle>),
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::Global(Arc::new(NoThrottle))
    }
}

impl ThrottlePolicy {
    /// Builds the policy described by a throttle configuration section
    pub fn from_config(config: &ThrottleConfig) -> ConfigResult<Self> {
        let spec = ThrottleSpec::from(config);
        if config.per_host {
            Ok(Self::PerHost(Arc::new(HostThrottle::new(spec)?)))
        } else {
            Ok(Self::Global(spec.build()?))
        }
    }

    /// Waits until a request to `url` may proceed
    pub async fn hold_for(&self, url: &str) {
        match self {
            Self::Global(throttle) => throttle.hold().await,
            Self::PerHost(hosts) => hosts.for_url(url).hold().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_spec_from_config() {
        let config = ThrottleConfig {
            kind: ThrottleKind::Window,
            max_requests: 4,
            window_ms: 250,
            ..ThrottleConfig::default()
        };
        assert_eq!(
            ThrottleSpec::from(&config),
            ThrottleSpec::TimeWindow {
                max_requests: 4,
                window: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_invalid_spec_fails_at_construction() {
        let spec = ThrottleSpec::TimeWindow {
            max_requests: 0,
            window: Duration::from_secs(1),
        };
        assert!(spec.build().is_err());
        assert!(HostThrottle::new(spec).is_err());
    }

    #[test]
    fn test_host_throttle_reuses_instances() {
        let hosts = HostThrottle::new(ThrottleSpec::None).unwrap();
        let a1 = hosts.for_url("http://a.test/1");
        let a2 = hosts.for_url("http://A.test/2");
        let b = hosts.for_url("http://b.test/");

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(hosts.host_count(), 2);

        let orphan = hosts.for_url("not a url");
        assert_eq!(hosts.host_count(), 2);
        drop(orphan);
    }

    #[tokio::test]
    async fn test_per_host_policy_does_not_block_other_hosts() {
        let policy = ThrottlePolicy::PerHost(Arc::new(
            HostThrottle::new(ThrottleSpec::FixedInterval(Duration::from_secs(10))).unwrap(),
        ));

        let start = Instant::now();
        policy.hold_for("http://a.test/").await;
        policy.hold_for("http://b.test/").await;
        policy.hold_for("http://c.test/").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
