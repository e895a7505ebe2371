//! Chunk pool statistics.
//!
//! Tracks reason traffic, steals, loads and conversions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for chunk pool operations.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Chunk reasons taken
    reasons_added: AtomicU64,
    /// Chunk reasons released
    reasons_removed: AtomicU64,
    /// Chunks taken from another owner
    steals: AtomicU64,
    /// Loads deferred to the load queue
    loads_enqueued: AtomicU64,
    /// Loads that populated a chunk
    loads_completed: AtomicU64,
    /// Bytes read into chunks
    bytes_loaded: AtomicU64,
    /// Loads that failed outright
    load_failures: AtomicU64,
    /// Requests the pool could not supply a chunk for
    allocation_failures: AtomicU64,
    /// Chunks converted to the native layout
    conversions: AtomicU64,
    /// Requests served by a chunk already bound to its owner
    cache_hits: AtomicU64,
    /// Requests that needed a fresh chunk
    cache_misses: AtomicU64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_reason_added(&self) {
        self.reasons_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reason_removed(&self) {
        self.reasons_removed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_steal(&self) {
        self.steals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_load_enqueued(&self) {
        self.loads_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed load of `bytes` bytes.
    #[inline]
    pub fn record_load(&self, bytes: u64) {
        self.loads_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_allocation_failure(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_conversion(&self) {
        self.conversions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of current metrics.
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            reasons_added: self.reasons_added.load(Ordering::Relaxed),
            reasons_removed: self.reasons_removed.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            loads_enqueued: self.loads_enqueued.load(Ordering::Relaxed),
            loads_completed: self.loads_completed.load(Ordering::Relaxed),
            bytes_loaded: self.bytes_loaded.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        for counter in [
            &self.reasons_added,
            &self.reasons_removed,
            &self.steals,
            &self.loads_enqueued,
            &self.loads_completed,
            &self.bytes_loaded,
            &self.load_failures,
            &self.allocation_failures,
            &self.conversions,
            &self.cache_hits,
            &self.cache_misses,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of pool metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    pub reasons_added: u64,
    pub reasons_removed: u64,
    pub steals: u64,
    pub loads_enqueued: u64,
    pub loads_completed: u64,
    pub bytes_loaded: u64,
    pub load_failures: u64,
    pub allocation_failures: u64,
    pub conversions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl PoolMetricsSnapshot {
    /// Reasons currently outstanding.
    pub fn reasons_outstanding(&self) -> u64 {
        self.reasons_added.saturating_sub(self.reasons_removed)
    }

    /// Fraction of requests served without a fresh chunk (0.0 - 1.0).
    ///
    /// Returns 1.0 if nothing has been requested.
    pub fn hit_rate(&self) -> f32 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            1.0
        } else {
            self.cache_hits as f32 / total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PoolMetrics::new();

        metrics.record_reason_added();
        metrics.record_reason_added();
        metrics.record_reason_removed();
        metrics.record_steal();
        metrics.record_load(32768);
        metrics.record_load(1024);
        metrics.record_load_failure();
        metrics.record_conversion();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reasons_added, 2);
        assert_eq!(snapshot.reasons_removed, 1);
        assert_eq!(snapshot.reasons_outstanding(), 1);
        assert_eq!(snapshot.steals, 1);
        assert_eq!(snapshot.loads_completed, 2);
        assert_eq!(snapshot.bytes_loaded, 33792);
        assert_eq!(snapshot.load_failures, 1);
        assert_eq!(snapshot.conversions, 1);
    }

    #[test]
    fn test_hit_rate() {
        let snapshot = PoolMetricsSnapshot {
            cache_hits: 75,
            cache_misses: 25,
            ..Default::default()
        };
        assert!((snapshot.hit_rate() - 0.75).abs() < 0.001);
        assert!((PoolMetricsSnapshot::default().hit_rate() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = PoolMetrics::new();
        metrics.record_cache_hit();
        metrics.record_steal();
        metrics.reset();
        assert_eq!(metrics.snapshot(), PoolMetricsSnapshot::default());
    }
}
