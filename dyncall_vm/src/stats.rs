//! Per-site and per-array dispatch statistics.
//!
//! Counters are relaxed atomics; they are diagnostics only and never feed
//! back into dispatch decisions.

use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Site Statistics
// =============================================================================

/// Live counters for one call site.
#[derive(Debug, Default)]
pub struct SiteStats {
    /// Guard accepted the cached target.
    hits: AtomicU64,
    /// Guard rejected or slot was empty/failed.
    misses: AtomicU64,
    /// Successful slow-path resolutions.
    resolutions: AtomicU64,
    /// Slow-path resolutions that raised an error.
    failures: AtomicU64,
    /// Explicit resets of this site.
    invalidations: AtomicU64,
}

impl SiteStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a resolved target and return the new resolution count.
    #[inline]
    pub(crate) fn record_resolution(&self) -> u64 {
        self.resolutions.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters.
    pub fn snapshot(&self) -> SiteStatsSnapshot {
        SiteStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of `SiteStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub resolutions: u64,
    pub failures: u64,
    pub invalidations: u64,
}

impl SiteStatsSnapshot {
    /// Total invocations observed by the site.
    pub fn calls(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.calls();
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

// =============================================================================
// Array Statistics
// =============================================================================

/// Aggregate view of every site in a `CallSiteArray`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayStats {
    /// Sites that have never resolved or were reset.
    pub empty: usize,
    /// Sites holding a target.
    pub cached: usize,
    /// Sites whose last resolution failed.
    pub failed: usize,
    /// Sites past the thrash threshold.
    pub thrashing: usize,
    /// Summed site counters.
    pub totals: SiteStatsSnapshot,
}

impl ArrayStats {
    /// Total sites counted.
    pub fn sites(&self) -> usize {
        self.empty + self.cached + self.failed
    }

    pub(crate) fn absorb(&mut self, site: &SiteStatsSnapshot) {
        self.totals.hits += site.hits;
        self.totals.misses += site.misses;
        self.totals.resolutions += site.resolutions;
        self.totals.failures += site.failures;
        self.totals.invalidations += site.invalidations;
    }
}
