//! Gateway health cache
//!
//! Liveness probes are cheap but not free, and a dead endpoint stays dead
//! for a while. Probe outcomes are cached with a short TTL so that within
//! one window each gateway is probed at most once, and an unreachable
//! gateway is not hammered by every caller that considers it.

use std::future::Future;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::gateway::Gateway;

/// How long a probe outcome stays valid
pub const HEALTH_TTL: Duration = Duration::from_secs(60);

/// Probe budget; expiry resolves to unhealthy rather than an error
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
struct HealthEntry {
    healthy: bool,
    checked_at: Instant,
}

/// Time-boxed cache of gateway liveness outcomes
#[derive(Debug)]
pub struct HealthCache {
    ttl: Duration,
    probe_timeout: Duration,
    entries: DashMap<String, HealthEntry>,
}

impl Default for HealthCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCache {
    pub fn new() -> Self {
        Self::with_policy(HEALTH_TTL, PROBE_TIMEOUT)
    }

    pub fn with_policy(ttl: Duration, probe_timeout: Duration) -> Self {
        Self {
            ttl,
            probe_timeout,
            entries: DashMap::new(),
        }
    }

    /// The cached outcome for `uri` as of `now`, if still within the TTL
    pub fn cached(&self, uri: &str, now: Instant) -> Option<bool> {
        let entry = self.entries.get(uri)?;
        if now.duration_since(entry.checked_at) < self.ttl {
            Some(entry.healthy)
        } else {
            None
        }
    }

    fn record(&self, uri: &str, healthy: bool, now: Instant) {
        self.entries.insert(
            uri.to_string(),
            HealthEntry {
                healthy,
                checked_at: now,
            },
        );
    }

    /// Probe `gateway` unless a fresh cached outcome exists
    pub async fn is_healthy(&self, gateway: &Gateway) -> bool {
        self.check_with(&gateway.url, || gateway.ping()).await
    }

    /// Cache-aside check: consult the cache, otherwise run `probe` raced
    /// against the probe timeout and cache the outcome. Expiry and probe
    /// failure both record unhealthy.
    pub async fn check_with<F, Fut>(&self, uri: &str, probe: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        if let Some(healthy) = self.cached(uri, Instant::now()) {
            return healthy;
        }
        let healthy = tokio::time::timeout(self.probe_timeout, probe())
            .await
            .unwrap_or(false);
        if !healthy {
            log::debug!("gateway {} marked unhealthy", uri);
        }
        self.record(uri, healthy, Instant::now());
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cached_respects_ttl() {
        let cache = HealthCache::with_policy(Duration::from_secs(60), PROBE_TIMEOUT);
        let now = Instant::now();
        cache.record("https://gw", false, now);

        assert_eq!(cache.cached("https://gw", now), Some(false));
        assert_eq!(
            cache.cached("https://gw", now + Duration::from_secs(59)),
            Some(false)
        );
        // outcome lapses once the TTL elapses
        assert_eq!(cache.cached("https://gw", now + Duration::from_secs(61)), None);
    }

    #[tokio::test]
    async fn test_probe_runs_once_within_ttl() {
        let cache = HealthCache::new();
        let probes = AtomicUsize::new(0);

        for _ in 0..5 {
            let healthy = cache
                .check_with("https://gw", || async {
                    probes.fetch_add(1, Ordering::SeqCst);
                    true
                })
                .await;
            assert!(healthy);
        }
        // probe count is a function of elapsed time, not call count
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_outcome_is_cached() {
        let cache = HealthCache::new();
        let probes = AtomicUsize::new(0);

        for _ in 0..3 {
            let healthy = cache
                .check_with("https://dead", || async {
                    probes.fetch_add(1, Ordering::SeqCst);
                    false
                })
                .await;
            assert!(!healthy);
        }
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_resolves_unhealthy() {
        let cache = HealthCache::new();
        let healthy = cache
            .check_with("https://slow", || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                true
            })
            .await;
        assert!(!healthy);
        assert_eq!(cache.cached("https://slow", Instant::now()), Some(false));
    }
}
