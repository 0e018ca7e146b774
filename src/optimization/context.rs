//! Relevance-driven shrinking of business-data snapshots

use super::classifier::{classify, QueryAnalysis};
use super::policies::{filter_recent, reduce_summary, serialized_len, simplify_item, sort_items};
use super::relevance::{DataCategory, RelevanceMap, HIGH_RELEVANCE};
use super::strategies::OptimizationStrategy;
use super::{estimate_data_size, OptimizationMetadata, OptimizedContext};
use crate::selector::ComplexityTier;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Default recency window in days
pub const DEFAULT_RECENT_DAYS: i64 = 30;

/// Shrinks a snapshot to the parts a query needs
#[derive(Debug, Clone)]
pub struct ContextOptimizer {
    recent_days: i64,
}

impl Default for ContextOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_DAYS)
    }
}

impl ContextOptimizer {
    pub fn new(recent_days: i64) -> Self {
        Self {
            recent_days: recent_days.max(1),
        }
    }

    pub fn recent_days(&self) -> i64 {
        self.recent_days
    }

    pub fn analyze_query(&self, query: &str) -> QueryAnalysis {
        classify(query)
    }

    /// Build a shrunk copy of `data` for `query`. Never fails: missing or
    /// malformed collections are skipped.
    pub fn prepare_optimal_context(
        &self,
        query: &str,
        data: &Value,
        tier_hint: Option<ComplexityTier>,
    ) -> OptimizedContext {
        self.prepare_optimal_context_at(query, data, tier_hint, Utc::now())
    }

    /// Same as [`prepare_optimal_context`](Self::prepare_optimal_context)
    /// with an explicit clock for the recency filter
    pub fn prepare_optimal_context_at(
        &self,
        query: &str,
        data: &Value,
        tier_hint: Option<ComplexityTier>,
        now: DateTime<Utc>,
    ) -> OptimizedContext {
        let analysis = classify(query);
        let relevance = RelevanceMap::build(&analysis);
        let strategy = OptimizationStrategy::select(&analysis, tier_hint);

        let mut shrunk = Map::new();
        let mut included = Vec::new();

        if let Some(source) = data.as_object() {
            for category in DataCategory::ALL {
                let Some(value) = source.get(category.key()) else {
                    continue;
                };
                let weight = relevance.weight(category);
                if let Some(reduced) =
                    self.shrink_category(category, value, weight, &analysis, strategy, now)
                {
                    shrunk.insert(category.key().to_string(), reduced);
                    included.push(category);
                }
            }
        } else {
            debug!("Business data is not an object, sending empty context");
        }

        let mut shrunk = Value::Object(shrunk);
        let original_size = estimate_data_size(data);
        let mut optimized_size = estimate_data_size(&shrunk);

        if optimized_size > original_size {
            debug!(
                original_size,
                optimized_size, "Shrunk context is larger than the input, sending the input"
            );
            shrunk = data.clone();
            optimized_size = original_size;
            included = DataCategory::ALL
                .into_iter()
                .filter(|c| data.get(c.key()).is_some())
                .collect();
        }
        let reduction_percent = if original_size > 0 {
            (1.0 - optimized_size as f64 / original_size as f64) * 100.0
        } else {
            0.0
        };

        debug!(
            strategy = %strategy,
            original_size,
            optimized_size,
            "Context reduced by {:.1}%",
            reduction_percent
        );

        OptimizedContext {
            data: shrunk,
            metadata: OptimizationMetadata {
                strategy,
                original_size,
                optimized_size,
                reduction_percent,
                included_categories: included,
                confidence: analysis.confidence,
                relevance,
                analysis,
            },
        }
    }

    fn shrink_category(
        &self,
        category: DataCategory,
        value: &Value,
        weight: f64,
        analysis: &QueryAnalysis,
        strategy: OptimizationStrategy,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        let preset = strategy.preset();

        match category {
            DataCategory::Summary => Some(if preset.keep_details {
                value.clone()
            } else {
                reduce_summary(value)
            }),
            DataCategory::Analysis => {
                (preset.include_secondary || weight >= HIGH_RELEVANCE).then(|| value.clone())
            }
            _ => {
                if strategy == OptimizationStrategy::Minimal && weight < HIGH_RELEVANCE {
                    return None;
                }
                let Some(items) = value.as_array() else {
                    debug!(category = %category, "Skipping malformed collection");
                    return None;
                };

                let mut items = items.clone();
                if analysis.time_scope.recent {
                    items = filter_recent(category, items, now, self.recent_days);
                }

                if strategy == OptimizationStrategy::Minimal && analysis.is_count_only() {
                    let count = json!({ "count": items.len() });
                    if serialized_len(&count) <= serialized_len(value) {
                        return Some(count);
                    }
                }

                sort_items(category, &mut items);
                let limit = (preset.max_items as f64 * weight).ceil() as usize;
                items.truncate(limit);

                if !preset.keep_details {
                    items = items
                        .iter()
                        .map(|item| simplify_item(category, item))
                        .collect();
                }
                Some(Value::Array(items))
            }
        }
    }
}
