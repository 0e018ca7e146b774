//! Rule-based tier scoring and usage accounting

use super::analysis::{estimate_tokens, QueryCharacteristics, TokenEstimate};
use super::{default_tiers, ComplexityTier, ModelConfig, ModelTierSpec, ScoringWeights, SelectionOptions};
use crate::metrics::{StoreError, UsageStats, UsageStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Extra completion tokens allowed on top of the estimate
const OUTPUT_TOKEN_BUFFER: usize = 100;

/// Score breakdown for one tier
#[derive(Debug, Clone, Serialize)]
pub struct TierScore {
    pub name: String,
    pub score: f64,
    pub estimated_cost: f64,
    pub fits_context: bool,
    pub within_budget: bool,
}

/// Selects a model tier per query and keeps cumulative usage stats
pub struct ModelSelector {
    tiers: Vec<ModelTierSpec>,
    weights: ScoringWeights,
    store: Arc<dyn UsageStore>,
}

impl ModelSelector {
    /// Create a selector over the given tiers. An empty table falls back to the defaults.
    pub fn new(tiers: Vec<ModelTierSpec>, weights: ScoringWeights, store: Arc<dyn UsageStore>) -> Self {
        let tiers = if tiers.is_empty() {
            warn!("No model tiers configured, using built-in table");
            default_tiers()
        } else {
            tiers
        };

        Self {
            tiers,
            weights,
            store,
        }
    }

    pub fn with_defaults(store: Arc<dyn UsageStore>) -> Self {
        Self::new(default_tiers(), ScoringWeights::default(), store)
    }

    pub fn tiers(&self) -> &[ModelTierSpec] {
        &self.tiers
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Choose the best tier for a query with `estimated_data_size` units of context.
    ///
    /// The highest score wins; on a tie the first tier wins unless only the
    /// later one fits its context window. When no tier fits, the best-scoring
    /// tier is still returned.
    pub fn select_optimal_model(
        &self,
        query: &str,
        estimated_data_size: usize,
        complexity_hint: Option<ComplexityTier>,
        options: &SelectionOptions,
    ) -> ModelConfig {
        let characteristics = QueryCharacteristics::analyze(query);
        let complexity = complexity_hint.unwrap_or_else(|| characteristics.complexity_tier());
        let tokens = estimate_tokens(estimated_data_size, characteristics.output_size);

        let scores = self.score_tiers(complexity, &tokens, options);

        let mut best = 0;
        for (idx, candidate) in scores.iter().enumerate().skip(1) {
            let current = &scores[best];
            let better = candidate.score > current.score
                || (candidate.score == current.score
                    && candidate.fits_context
                    && !current.fits_context);
            if better {
                best = idx;
            }
        }

        let chosen = &scores[best];
        let tier = self.tiers[best].clone();
        let max_output_tokens = (tokens.output + OUTPUT_TOKEN_BUFFER).min(tier.max_context_tokens);

        if !chosen.fits_context {
            warn!(
                model = %tier.name,
                tokens = tokens.total,
                limit = tier.max_context_tokens,
                "No tier fits the estimated context, using best effort"
            );
        }

        debug!(
            model = %tier.name,
            score = chosen.score,
            complexity = %complexity,
            input_tokens = tokens.input,
            "Selected model tier"
        );

        ModelConfig {
            temperature: characteristics.temperature(),
            max_output_tokens,
            tokens,
            estimated_cost: chosen.estimated_cost,
            score: chosen.score,
            fits_context: chosen.fits_context,
            complexity,
            characteristics,
            tier,
        }
    }

    /// Score every tier in table order
    pub fn score_tiers(
        &self,
        complexity: ComplexityTier,
        tokens: &TokenEstimate,
        options: &SelectionOptions,
    ) -> Vec<TierScore> {
        let costs: Vec<f64> = self
            .tiers
            .iter()
            .map(|t| t.estimate_cost(tokens.input, tokens.output))
            .collect();
        let max_cost = costs.iter().cloned().fold(0.0_f64, f64::max);

        self.tiers
            .iter()
            .zip(costs)
            .map(|(tier, cost)| {
                let mut score = 0.0;

                if tier.use_case == complexity {
                    score += self.weights.use_case_match;
                }

                if options.prioritize_speed {
                    score += self.weights.speed * tier.speed.factor();
                }

                if options.prioritize_cost {
                    let relative = if max_cost > 0.0 { 1.0 - cost / max_cost } else { 1.0 };
                    score += self.weights.cost * relative;
                }

                if options.prioritize_accuracy {
                    score += self.weights.accuracy * tier.use_case.accuracy_factor();
                }

                let within_budget = options.max_cost.map_or(true, |budget| cost <= budget);
                if !within_budget {
                    score += self.weights.over_budget;
                }

                let fits_context = tokens.total <= tier.max_context_tokens;
                if !fits_context {
                    score += self.weights.context_overflow;
                }

                TierScore {
                    name: tier.name.clone(),
                    score,
                    estimated_cost: cost,
                    fits_context,
                    within_budget,
                }
            })
            .collect()
    }

    /// Cost avoided by not running the same call on the most expensive tier
    pub fn savings_versus_most_expensive(&self, model: &str, cost: f64) -> f64 {
        let Some(used) = self.tiers.iter().find(|t| t.name == model) else {
            return 0.0;
        };
        let used_rate = used.combined_rate();
        if used_rate <= 0.0 {
            return 0.0;
        }

        let max_rate = self
            .tiers
            .iter()
            .map(ModelTierSpec::combined_rate)
            .fold(0.0_f64, f64::max);

        (cost * max_rate / used_rate - cost).max(0.0)
    }

    /// Add one call to the persisted usage stats
    pub fn record_usage(&self, model: &str, cost: f64, response_time_ms: u64) -> Result<(), StoreError> {
        let savings = self.savings_versus_most_expensive(model, cost);
        let mut stats = self.store.load();
        stats.record(model, cost, response_time_ms, savings);
        self.store.save(&stats)?;

        debug!(model, cost, response_time_ms, savings, "Recorded model usage");
        Ok(())
    }

    pub fn get_usage_stats(&self) -> UsageStats {
        self.store.load()
    }

    pub fn reset_stats(&self) -> Result<(), StoreError> {
        self.store.save(&UsageStats::default())
    }
}
