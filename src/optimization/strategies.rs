//! Context shrinking presets

use super::classifier::QueryAnalysis;
use crate::selector::ComplexityTier;
use serde::{Deserialize, Serialize};

/// How aggressively the context gets shrunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStrategy {
    /// Summary plus the few items a narrow question needs
    Minimal,
    /// One clearly matched area with full item details
    Focused,
    /// Everything relevant, including secondary analysis
    Comprehensive,
}

/// Limits applied by a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyPreset {
    /// Items kept per fully relevant category
    pub max_items: usize,
    pub keep_details: bool,
    pub include_secondary: bool,
}

impl OptimizationStrategy {
    pub fn preset(&self) -> StrategyPreset {
        match self {
            OptimizationStrategy::Minimal => StrategyPreset {
                max_items: 10,
                keep_details: false,
                include_secondary: false,
            },
            OptimizationStrategy::Focused => StrategyPreset {
                max_items: 50,
                keep_details: true,
                include_secondary: false,
            },
            OptimizationStrategy::Comprehensive => StrategyPreset {
                max_items: 200,
                keep_details: true,
                include_secondary: true,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizationStrategy::Minimal => "minimal",
            OptimizationStrategy::Focused => "focused",
            OptimizationStrategy::Comprehensive => "comprehensive",
        }
    }

    /// Pick a preset from the model tier and how specific the query is
    pub fn select(analysis: &QueryAnalysis, tier_hint: Option<ComplexityTier>) -> Self {
        let tier = tier_hint.unwrap_or_else(|| derive_tier(analysis));

        if tier == ComplexityTier::Simple || analysis.is_count_only() {
            OptimizationStrategy::Minimal
        } else if tier == ComplexityTier::Balanced && analysis.is_single_category {
            OptimizationStrategy::Focused
        } else {
            OptimizationStrategy::Comprehensive
        }
    }
}

impl std::fmt::Display for OptimizationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Tier implied by the analysis when the caller gives no hint
fn derive_tier(analysis: &QueryAnalysis) -> ComplexityTier {
    if analysis.is_count_only() {
        ComplexityTier::Simple
    } else if analysis.is_single_category {
        ComplexityTier::Balanced
    } else {
        ComplexityTier::HighAccuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::classifier::classify;

    #[test]
    fn test_count_query_is_minimal() {
        let analysis = classify("Ile jest receptur w systemie?");
        assert_eq!(
            OptimizationStrategy::select(&analysis, None),
            OptimizationStrategy::Minimal
        );
        assert_eq!(
            OptimizationStrategy::select(&analysis, Some(ComplexityTier::HighAccuracy)),
            OptimizationStrategy::Minimal
        );
    }

    #[test]
    fn test_single_category_is_focused() {
        let analysis = classify("Pokaż zamówienia klienta Nowak");
        assert_eq!(
            OptimizationStrategy::select(&analysis, None),
            OptimizationStrategy::Focused
        );
        assert_eq!(
            OptimizationStrategy::select(&analysis, Some(ComplexityTier::Simple)),
            OptimizationStrategy::Minimal
        );
    }

    #[test]
    fn test_broad_query_is_comprehensive() {
        let analysis = classify("Pokaż dostawców dla receptur");
        assert_eq!(
            OptimizationStrategy::select(&analysis, None),
            OptimizationStrategy::Comprehensive
        );
        assert_eq!(
            OptimizationStrategy::select(&analysis, Some(ComplexityTier::Balanced)),
            OptimizationStrategy::Comprehensive
        );
    }

    #[test]
    fn test_presets() {
        assert_eq!(OptimizationStrategy::Minimal.preset().max_items, 10);
        assert!(!OptimizationStrategy::Focused.preset().include_secondary);
        assert!(OptimizationStrategy::Comprehensive.preset().keep_details);
        assert_eq!(OptimizationStrategy::Comprehensive.to_string(), "comprehensive");
    }
}
