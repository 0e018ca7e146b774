//! Reports produced by the optimization manager

use crate::cache::CacheStats;
use crate::metrics::UsageStats;
use crate::optimization::OptimizationStrategy;
use serde::Serialize;

/// Hit rate (%) under which the cache is considered ineffective
pub const LOW_HIT_RATE: f64 = 30.0;

/// Lookups needed before the hit rate is judged
pub const MIN_LOOKUPS_FOR_HIT_RATE: u64 = 10;

/// Occupancy (%) at which the cache is considered full
pub const HIGH_OCCUPANCY: f64 = 90.0;

/// Savings (USD) worth calling out
const NOTABLE_SAVINGS: f64 = 1.0;

/// Average processing time (ms) above which the benchmark warns
pub const SLOW_PROCESSING_MS: f64 = 100.0;

/// Average context reduction (%) under which the benchmark warns
pub const WEAK_REDUCTION_PERCENT: f64 = 20.0;

/// Typical gains of the optimization layer, shown for orientation
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExpectedImprovements {
    pub response_time_percent: f64,
    pub cost_percent: f64,
    pub token_usage_percent: f64,
}

pub const EXPECTED_IMPROVEMENTS: ExpectedImprovements = ExpectedImprovements {
    response_time_percent: 40.0,
    cost_percent: 60.0,
    token_usage_percent: 70.0,
};

fn hit_rate_is_low(cache: &CacheStats) -> bool {
    cache.total_lookups() >= MIN_LOOKUPS_FOR_HIT_RATE && cache.hit_rate < LOW_HIT_RATE
}

/// Rule-based advice derived from cache and usage counters
pub fn recommendations(cache: &CacheStats, usage: &UsageStats) -> Vec<String> {
    let mut advice = Vec::new();

    if hit_rate_is_low(cache) {
        advice.push(format!(
            "Cache hit rate is {:.1}%: consider a longer cache duration",
            cache.hit_rate
        ));
    }
    if cache.occupancy() >= HIGH_OCCUPANCY {
        advice.push(format!(
            "Cache is {:.0}% full: consider raising max_size",
            cache.occupancy()
        ));
    }
    if usage.estimated_savings > NOTABLE_SAVINGS {
        advice.push(format!(
            "Model selection has saved ${:.2} so far",
            usage.estimated_savings
        ));
    }
    if advice.is_empty() {
        advice.push("Optimization layer is performing well".to_string());
    }
    advice
}

/// Combined cache and usage report
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub cache: CacheStats,
    pub usage: UsageStats,
    pub expected_improvements: ExpectedImprovements,
    pub recommendations: Vec<String>,
}

impl std::fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cache)?;
        writeln!(f)?;
        write!(f, "{}", self.usage)?;
        writeln!(f)?;
        writeln!(f, "=== Expected Improvements ===")?;
        writeln!(f, "Response time: -{:.0}%", self.expected_improvements.response_time_percent)?;
        writeln!(f, "Cost: -{:.0}%", self.expected_improvements.cost_percent)?;
        writeln!(f, "Token usage: -{:.0}%", self.expected_improvements.token_usage_percent)?;
        writeln!(f)?;
        writeln!(f, "=== Recommendations ===")?;
        for line in &self.recommendations {
            writeln!(f, "- {}", line)?;
        }
        Ok(())
    }
}

/// Pipeline measurements for one benchmark query
#[derive(Debug, Clone, Serialize)]
pub struct QueryBenchmark {
    pub query: String,
    pub processing_ms: f64,
    pub model: String,
    pub strategy: OptimizationStrategy,
    pub original_size: usize,
    pub optimized_size: usize,
    pub reduction_percent: f64,
    /// Exact token count of the shrunk context
    pub context_tokens: usize,
    pub estimated_cost: f64,
}

/// Result of running the pipeline over a set of queries without calling a model
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceTestReport {
    pub results: Vec<QueryBenchmark>,
    pub average_processing_ms: f64,
    pub average_reduction_percent: f64,
    pub total_estimated_cost: f64,
    pub warnings: Vec<String>,
}

impl PerformanceTestReport {
    pub fn from_results(results: Vec<QueryBenchmark>) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let count = results.len() as f64;
        let average_processing_ms = results.iter().map(|r| r.processing_ms).sum::<f64>() / count;
        let average_reduction_percent =
            results.iter().map(|r| r.reduction_percent).sum::<f64>() / count;
        let total_estimated_cost = results.iter().map(|r| r.estimated_cost).sum();

        let mut warnings = Vec::new();
        if average_processing_ms > SLOW_PROCESSING_MS {
            warnings.push(format!(
                "Average processing time {:.1} ms exceeds {:.0} ms",
                average_processing_ms, SLOW_PROCESSING_MS
            ));
        }
        if average_reduction_percent < WEAK_REDUCTION_PERCENT {
            warnings.push(format!(
                "Average context reduction {:.1}% is below {:.0}%",
                average_reduction_percent, WEAK_REDUCTION_PERCENT
            ));
        }

        Self {
            results,
            average_processing_ms,
            average_reduction_percent,
            total_estimated_cost,
            warnings,
        }
    }
}

impl std::fmt::Display for PerformanceTestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Performance Test ===")?;
        for r in &self.results {
            writeln!(f, "{}", r.query)?;
            writeln!(
                f,
                "  {:<12} {:<14} {:>6} -> {:>6} est. tokens ({:>5.1}% less, {} exact)  {:>6.2} ms  ${:.5}",
                r.model,
                r.strategy.name(),
                r.original_size,
                r.optimized_size,
                r.reduction_percent,
                r.context_tokens,
                r.processing_ms,
                r.estimated_cost
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Queries: {}", self.results.len())?;
        writeln!(f, "Avg processing time: {:.2} ms", self.average_processing_ms)?;
        writeln!(f, "Avg context reduction: {:.1}%", self.average_reduction_percent)?;
        writeln!(f, "Total est. cost: ${:.4}", self.total_estimated_cost)?;
        for warning in &self.warnings {
            writeln!(f, "Warning: {}", warning)?;
        }
        Ok(())
    }
}

/// Coarse health label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Excellent,
    Warning,
}

impl Health {
    pub fn evaluate(cache: &CacheStats) -> Self {
        if cache.occupancy() >= HIGH_OCCUPANCY || hit_rate_is_low(cache) {
            Health::Warning
        } else {
            Health::Excellent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Excellent => "excellent",
            Health::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub health: Health,
    pub hit_rate: f64,
    pub occupancy: f64,
    pub cache_size: usize,
    pub max_size: usize,
    pub total_lookups: u64,
    pub cleanup_timer_running: bool,
    pub total_invocations: u64,
    pub total_cost: f64,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== System Status ===")?;
        writeln!(f, "Health: {}", self.health)?;
        writeln!(f, "Cache: {}/{} entries ({:.0}%)", self.cache_size, self.max_size, self.occupancy)?;
        writeln!(f, "Hit rate: {:.1}% over {} lookups", self.hit_rate, self.total_lookups)?;
        writeln!(
            f,
            "Cleanup timer: {}",
            if self.cleanup_timer_running { "running" } else { "idle" }
        )?;
        writeln!(f, "Model calls: {} (${:.4})", self.total_invocations, self.total_cost)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_stats(hits: u64, misses: u64, size: usize, max_size: usize) -> CacheStats {
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            writes: misses,
            evictions: 0,
            expired: 0,
            cleanups: 0,
            cost_saved: 0.0,
            hit_rate: if total > 0 { hits as f64 / total as f64 * 100.0 } else { 0.0 },
            size,
            max_size,
        }
    }

    #[test]
    fn test_healthy_cache() {
        let stats = cache_stats(8, 4, 20, 100);
        assert_eq!(Health::evaluate(&stats), Health::Excellent);
        assert_eq!(
            recommendations(&stats, &UsageStats::default()),
            vec!["Optimization layer is performing well".to_string()]
        );
    }

    #[test]
    fn test_low_hit_rate_needs_enough_lookups() {
        assert_eq!(Health::evaluate(&cache_stats(0, 5, 5, 100)), Health::Excellent);

        let stats = cache_stats(2, 18, 18, 100);
        assert_eq!(Health::evaluate(&stats), Health::Warning);
        let advice = recommendations(&stats, &UsageStats::default());
        assert!(advice[0].contains("cache duration"));
    }

    #[test]
    fn test_full_cache() {
        let stats = cache_stats(50, 10, 95, 100);
        assert_eq!(Health::evaluate(&stats), Health::Warning);
        let advice = recommendations(&stats, &UsageStats::default());
        assert!(advice.iter().any(|a| a.contains("max_size")));
    }

    #[test]
    fn test_savings_message() {
        let mut usage = UsageStats::default();
        usage.record("gpt-4o-mini", 0.01, 100, 1.5);
        let advice = recommendations(&cache_stats(8, 2, 10, 100), &usage);
        assert_eq!(advice.len(), 1);
        assert!(advice[0].contains("$1.50"));
    }

    fn benchmark(ms: f64, reduction: f64) -> QueryBenchmark {
        QueryBenchmark {
            query: "q".into(),
            processing_ms: ms,
            model: "gpt-4o-mini".into(),
            strategy: OptimizationStrategy::Minimal,
            original_size: 100,
            optimized_size: 50,
            reduction_percent: reduction,
            context_tokens: 40,
            estimated_cost: 0.001,
        }
    }

    #[test]
    fn test_benchmark_averages_and_warnings() {
        let report = PerformanceTestReport::from_results(vec![benchmark(2.0, 80.0), benchmark(4.0, 60.0)]);
        assert!((report.average_processing_ms - 3.0).abs() < 1e-9);
        assert!((report.average_reduction_percent - 70.0).abs() < 1e-9);
        assert!(report.warnings.is_empty());

        let slow = PerformanceTestReport::from_results(vec![benchmark(250.0, 5.0)]);
        assert_eq!(slow.warnings.len(), 2);
    }

    #[test]
    fn test_empty_benchmark() {
        let report = PerformanceTestReport::from_results(Vec::new());
        assert!(report.results.is_empty());
        assert_eq!(report.average_processing_ms, 0.0);
        assert!(report.warnings.is_empty());
    }
}
