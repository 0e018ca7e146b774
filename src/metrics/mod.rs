//! Cumulative model usage statistics

mod store;

pub use store::{FileUsageStore, MemoryUsageStore, StoreError, UsageStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage counters for a single model tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub invocations: u64,
    /// Total cost in USD
    pub total_cost: f64,
    pub total_response_time_ms: u64,
}

impl ModelUsage {
    pub fn average_cost(&self) -> f64 {
        if self.invocations == 0 {
            return 0.0;
        }
        self.total_cost / self.invocations as f64
    }

    pub fn average_response_time_ms(&self) -> f64 {
        if self.invocations == 0 {
            return 0.0;
        }
        self.total_response_time_ms as f64 / self.invocations as f64
    }
}

/// Usage across all model tiers, persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    /// Per-model counters keyed by model name
    pub models: BTreeMap<String, ModelUsage>,
    pub total_invocations: u64,
    /// Total cost in USD
    pub total_cost: f64,
    pub total_response_time_ms: u64,
    /// Cost avoided compared to always using the most expensive tier (USD)
    pub estimated_savings: f64,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, cost: f64, response_time_ms: u64, savings: f64) {
        let usage = self.models.entry(model.to_string()).or_default();
        usage.invocations += 1;
        usage.total_cost += cost;
        usage.total_response_time_ms += response_time_ms;

        self.total_invocations += 1;
        self.total_cost += cost;
        self.total_response_time_ms += response_time_ms;
        self.estimated_savings += savings.max(0.0);
    }

    pub fn average_cost(&self) -> f64 {
        if self.total_invocations == 0 {
            return 0.0;
        }
        self.total_cost / self.total_invocations as f64
    }

    pub fn average_response_time_ms(&self) -> f64 {
        if self.total_invocations == 0 {
            return 0.0;
        }
        self.total_response_time_ms as f64 / self.total_invocations as f64
    }

    /// Model with the most invocations
    pub fn most_used_model(&self) -> Option<&str> {
        self.models
            .iter()
            .max_by_key(|(_, usage)| usage.invocations)
            .map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Display for UsageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Model Usage ===")?;
        writeln!(f, "Total requests: {}", self.total_invocations)?;
        writeln!(f, "Total cost: ${:.4}", self.total_cost)?;
        writeln!(f, "Avg cost/request: ${:.5}", self.average_cost())?;
        writeln!(f, "Avg response time: {:.0} ms", self.average_response_time_ms())?;
        writeln!(f, "Est. savings: ${:.4}", self.estimated_savings)?;
        for (name, usage) in &self.models {
            writeln!(
                f,
                "  {:<16} {:>6} calls  ${:>9.4}  {:>7.0} ms avg",
                name,
                usage.invocations,
                usage.total_cost,
                usage.average_response_time_ms()
            )?;
        }
        Ok(())
    }
}
