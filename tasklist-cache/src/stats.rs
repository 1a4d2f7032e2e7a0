//! Counters describing how reads were served.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a fresh entry.
    pub hits: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Reads that joined a fetch started by someone else.
    pub joins: u64,
    /// Fetches that completed with an error.
    pub failures: u64,
    /// Invalidations that changed an entry's state.
    pub invalidations: u64,
}

impl CacheStats {
    /// Fraction of reads served without a network call (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.fetches + self.joins;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    pub hits: AtomicU64,
    pub fetches: AtomicU64,
    pub joins: AtomicU64,
    pub failures: AtomicU64,
    pub invalidations: AtomicU64,
}

impl StatCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 6,
            fetches: 2,
            joins: 2,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.6).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = StatCounters::default();
        StatCounters::bump(&counters.hits);
        StatCounters::bump(&counters.hits);
        StatCounters::bump(&counters.failures);
        let stats = counters.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.fetches, 0);
    }
}
