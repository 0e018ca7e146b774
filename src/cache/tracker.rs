//! Hit/miss accounting for the response cache

use serde::{Deserialize, Serialize};

/// Counters maintained by the response cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups that fell through to the model API
    pub misses: u64,
    /// Entries written after a miss
    pub writes: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Entries removed because they outlived the cache duration
    pub expired: u64,
    /// Background sweep runs
    pub cleanups: u64,
    /// Sum of the estimated cost of every call avoided by a hit (USD)
    pub cost_saved: f64,
}

impl CacheMetrics {
    pub fn record_hit(&mut self, estimated_cost: f64) {
        self.hits += 1;
        self.cost_saved += estimated_cost.max(0.0);
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    pub fn record_cleanup(&mut self) {
        self.cleanups += 1;
    }

    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hit rate as a percentage (0-100)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total > 0 {
            self.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }
}

/// Point-in-time view of the cache returned by `ResponseCache::stats`
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub expired: u64,
    pub cleanups: u64,
    pub cost_saved: f64,
    /// Hit rate as a percentage (0-100)
    pub hit_rate: f64,
    pub size: usize,
    pub max_size: usize,
}

impl CacheStats {
    pub(crate) fn from_metrics(metrics: &CacheMetrics, size: usize, max_size: usize) -> Self {
        Self {
            hits: metrics.hits,
            misses: metrics.misses,
            writes: metrics.writes,
            evictions: metrics.evictions,
            expired: metrics.expired,
            cleanups: metrics.cleanups,
            cost_saved: metrics.cost_saved,
            hit_rate: metrics.hit_rate(),
            size,
            max_size,
        }
    }

    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Occupancy as a percentage of `max_size`
    pub fn occupancy(&self) -> f64 {
        if self.max_size == 0 {
            return 100.0;
        }
        self.size as f64 / self.max_size as f64 * 100.0
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Response Cache ===")?;
        writeln!(f, "Entries: {}/{} ({:.0}%)", self.size, self.max_size, self.occupancy())?;
        writeln!(f, "Hits: {}", self.hits)?;
        writeln!(f, "Misses: {}", self.misses)?;
        writeln!(f, "Hit rate: {:.1}%", self.hit_rate)?;
        writeln!(f, "Evictions: {} (expired: {})", self.evictions, self.expired)?;
        writeln!(f, "Cleanup runs: {}", self.cleanups)?;
        writeln!(f, "Est. cost saved: ${:.4}", self.cost_saved)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_hit_rate() {
        let mut metrics = CacheMetrics::default();

        metrics.record_hit(0.01);
        metrics.record_hit(0.02);
        metrics.record_miss();

        assert!((metrics.hit_rate() - 66.666).abs() < 0.01);
        assert!((metrics.cost_saved - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_without_lookups() {
        assert_eq!(CacheMetrics::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_negative_cost_not_counted() {
        let mut metrics = CacheMetrics::default();
        metrics.record_hit(-1.0);
        assert_eq!(metrics.cost_saved, 0.0);
        assert_eq!(metrics.hits, 1);
    }

    #[test]
    fn test_stats_occupancy() {
        let stats = CacheStats::from_metrics(&CacheMetrics::default(), 45, 100);
        assert!((stats.occupancy() - 45.0).abs() < f64::EPSILON);
    }
}
