//! Model tier selection
//!
//! Picks the model tier for a query by scoring every configured tier against
//! the query's characteristics, the estimated token volume and the caller's
//! priorities (speed, cost, accuracy, budget ceiling).

mod analysis;
mod scoring;

pub use analysis::{estimate_tokens, OutputSize, QueryCharacteristics, TokenEstimate};
pub use scoring::{ModelSelector, TierScore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a tier is meant for; also the complexity a query resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplexityTier {
    Simple,
    Balanced,
    HighAccuracy,
}

impl ComplexityTier {
    /// Multiplier applied to the accuracy weight
    pub fn accuracy_factor(&self) -> f64 {
        match self {
            ComplexityTier::Simple => 0.3,
            ComplexityTier::Balanced => 0.6,
            ComplexityTier::HighAccuracy => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Simple => "simple",
            ComplexityTier::Balanced => "balanced",
            ComplexityTier::HighAccuracy => "high-accuracy",
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative latency class of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedClass {
    Fast,
    Medium,
    Slow,
}

impl SpeedClass {
    /// Multiplier applied to the speed weight
    pub fn factor(&self) -> f64 {
        match self {
            SpeedClass::Fast => 1.0,
            SpeedClass::Medium => 0.6,
            SpeedClass::Slow => 0.3,
        }
    }
}

/// Static description of a model tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTierSpec {
    pub name: String,
    /// USD per 1000 prompt tokens
    pub cost_per_1k_input: f64,
    /// USD per 1000 completion tokens
    pub cost_per_1k_output: f64,
    pub max_context_tokens: usize,
    pub speed: SpeedClass,
    /// Recommended use
    pub use_case: ComplexityTier,
    #[serde(default)]
    pub capability_tags: BTreeSet<String>,
}

impl ModelTierSpec {
    pub fn new(
        name: impl Into<String>,
        cost_per_1k_input: f64,
        cost_per_1k_output: f64,
        max_context_tokens: usize,
        speed: SpeedClass,
        use_case: ComplexityTier,
    ) -> Self {
        Self {
            name: name.into(),
            cost_per_1k_input,
            cost_per_1k_output,
            max_context_tokens,
            speed,
            use_case,
            capability_tags: BTreeSet::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.capability_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.capability_tags.contains(tag)
    }

    /// Estimated USD cost of a call with the given token counts
    pub fn estimate_cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        (input_tokens as f64 / 1000.0) * self.cost_per_1k_input
            + (output_tokens as f64 / 1000.0) * self.cost_per_1k_output
    }

    /// Combined per-1k price, used to compare tiers
    pub fn combined_rate(&self) -> f64 {
        self.cost_per_1k_input + self.cost_per_1k_output
    }
}

/// Built-in tier table
pub fn default_tiers() -> Vec<ModelTierSpec> {
    vec![
        ModelTierSpec::new(
            "gpt-4o-mini",
            0.00015,
            0.0006,
            128_000,
            SpeedClass::Fast,
            ComplexityTier::Simple,
        )
        .with_tags(&["simple", "fast", "cheap"]),
        ModelTierSpec::new(
            "gpt-4o",
            0.0025,
            0.01,
            128_000,
            SpeedClass::Medium,
            ComplexityTier::Balanced,
        )
        .with_tags(&["balanced", "general"]),
        ModelTierSpec::new(
            "gpt-4",
            0.03,
            0.06,
            8_192,
            SpeedClass::Slow,
            ComplexityTier::HighAccuracy,
        )
        .with_tags(&["high-accuracy", "analysis", "complex"]),
    ]
}

/// Score contributions. Relative magnitudes decide which tier wins under
/// which priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub use_case_match: f64,
    pub speed: f64,
    pub cost: f64,
    pub accuracy: f64,
    pub over_budget: f64,
    pub context_overflow: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            use_case_match: 50.0,
            speed: 30.0,
            cost: 30.0,
            accuracy: 30.0,
            over_budget: -100.0,
            context_overflow: -50.0,
        }
    }
}

/// Caller priorities for a single selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    pub prioritize_speed: bool,
    pub prioritize_cost: bool,
    pub prioritize_accuracy: bool,
    /// Budget ceiling per request in USD
    pub max_cost: Option<f64>,
}

/// The chosen tier plus the call parameters derived for it
#[derive(Debug, Clone, Serialize)]
pub struct ModelConfig {
    pub tier: ModelTierSpec,
    pub temperature: f32,
    pub max_output_tokens: usize,
    pub tokens: TokenEstimate,
    /// Estimated USD cost of the call on this tier
    pub estimated_cost: f64,
    pub score: f64,
    pub fits_context: bool,
    pub complexity: ComplexityTier,
    pub characteristics: QueryCharacteristics,
}

impl ModelConfig {
    pub fn model_name(&self) -> &str {
        &self.tier.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_cost() {
        let tier = ModelTierSpec::new("t", 1.0, 2.0, 1000, SpeedClass::Fast, ComplexityTier::Simple);
        assert!((tier.estimate_cost(500, 250) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_tiers_cover_every_use_case() {
        let tiers = default_tiers();
        for tier in [
            ComplexityTier::Simple,
            ComplexityTier::Balanced,
            ComplexityTier::HighAccuracy,
        ] {
            assert!(tiers.iter().any(|t| t.use_case == tier));
        }
        assert!(tiers[0].has_tag("simple"));
    }

    #[test]
    fn test_tier_spec_toml_shape() {
        let tier: ModelTierSpec = toml::from_str(
            r#"
            name = "local-llama"
            cost_per_1k_input = 0.0
            cost_per_1k_output = 0.0
            max_context_tokens = 8192
            speed = "fast"
            use_case = "high-accuracy"
            capability_tags = ["local"]
            "#,
        )
        .expect("valid tier");
        assert_eq!(tier.use_case, ComplexityTier::HighAccuracy);
        assert!(tier.has_tag("local"));
    }
}
