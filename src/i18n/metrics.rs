//! Resolution metrics.
//!
//! Counters for cache effectiveness and lookup traffic. Each engine owns its
//! own instance so that separate sessions (and tests) never share counts.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters updated along the resolution path.
#[derive(Debug, Default)]
pub struct ResolutionMetrics {
    /// Phrases served from an unexpired cache record
    cache_hits: AtomicUsize,

    /// Phrases with no usable cache record (absent, expired or unreadable)
    cache_misses: AtomicUsize,

    /// Phrases resolved to themselves without consulting cache or network
    identity_resolutions: AtomicUsize,

    /// Batched lookup requests sent
    batches_sent: AtomicUsize,

    /// Batched lookup requests that failed
    batch_failures: AtomicUsize,

    /// Phrases carried by all batched requests
    phrases_requested: AtomicUsize,
}

impl ResolutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_identity(&self) {
        self.identity_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batched request carrying `phrases` phrases.
    pub fn record_batch(&self, phrases: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.phrases_requested.fetch_add(phrases, Ordering::Relaxed);
    }

    pub fn record_batch_failure(&self) {
        self.batch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current cache hit count.
    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Get the current cache miss count.
    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Get the number of phrases resolved to themselves without a lookup.
    pub fn identity_resolutions(&self) -> usize {
        self.identity_resolutions.load(Ordering::Relaxed)
    }

    /// Get the number of batched requests sent.
    pub fn batches_sent(&self) -> usize {
        self.batches_sent.load(Ordering::Relaxed)
    }

    /// Get the number of batched requests that failed.
    pub fn batch_failures(&self) -> usize {
        self.batch_failures.load(Ordering::Relaxed)
    }

    /// Get the total number of phrases sent for lookup.
    pub fn phrases_requested(&self) -> usize {
        self.phrases_requested.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        let batches = self.batches_sent();
        let failures = self.batch_failures();
        let batch_success_rate = if batches > 0 {
            (batches.saturating_sub(failures) as f64 / batches as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            identity_resolutions: self.identity_resolutions(),
            batches_sent: batches,
            batch_failures: failures,
            batch_success_rate,
            phrases_requested: self.phrases_requested(),
        }
    }
}

/// Snapshot of the resolution counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub identity_resolutions: usize,
    pub batches_sent: usize,
    pub batch_failures: usize,

    /// Batch success rate as a percentage (0-100)
    pub batch_success_rate: f64,

    pub phrases_requested: usize,
}
