//! Refresh counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters kept by the refresh coordinator.
#[derive(Debug, Default)]
pub struct RefreshStats {
    cache_hits: AtomicU64,
    first_loads: AtomicU64,
    refreshes: AtomicU64,
    coalesced_waits: AtomicU64,
    failures: AtomicU64,
    stale_after_refresh: AtomicU64,
}

/// Point-in-time copy of [`RefreshStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStatsSnapshot {
    /// Requests answered from the cache without a remote call.
    pub cache_hits: u64,
    /// Fetches that populated an empty cache entry.
    pub first_loads: u64,
    /// Fetches started to satisfy a minimum version.
    pub refreshes: u64,
    /// Callers that joined a fetch another caller started.
    pub coalesced_waits: u64,
    /// Fetches that failed or timed out.
    pub failures: u64,
    /// Refreshes that completed but stayed below the requested version.
    pub stale_after_refresh: u64,
}

impl RefreshStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_first_load(&self) {
        self.first_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale_after_refresh.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RefreshStatsSnapshot {
        RefreshStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            first_loads: self.first_loads.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            stale_after_refresh: self.stale_after_refresh.load(Ordering::Relaxed),
        }
    }
}

impl RefreshStatsSnapshot {
    /// Total remote fetches started.
    pub fn fetches(&self) -> u64 {
        self.first_loads + self.refreshes
    }

    /// Fraction of requests served without a remote call (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.fetches() + self.coalesced_waits;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = RefreshStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_first_load();
        stats.record_refresh();
        stats.record_coalesced();
        stats.record_failure();
        stats.record_stale();

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.fetches(), 2);
        assert_eq!(snap.coalesced_waits, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.stale_after_refresh, 1);
    }

    #[test]
    fn test_hit_rate() {
        let snap = RefreshStatsSnapshot {
            cache_hits: 6,
            refreshes: 1,
            first_loads: 1,
            ..Default::default()
        };
        assert!((snap.hit_rate() - 0.75).abs() < 0.001);
        assert!((RefreshStatsSnapshot::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
