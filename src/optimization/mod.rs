//! Context optimization for business-data prompts
//!
//! A query is classified into business categories and operations, every
//! data collection gets a relevance weight, and a strategy preset decides
//! how much of each collection survives. The result is a much smaller JSON
//! context plus metadata describing what was kept.

mod classifier;
mod context;
mod policies;
mod relevance;
mod strategies;

pub use classifier::{classify, QueryAnalysis, QueryCategory, QueryOperation, TimeScope};
pub use context::{ContextOptimizer, DEFAULT_RECENT_DAYS};
pub use policies::parse_date;
pub use relevance::{DataCategory, RelevanceMap, HIGH_RELEVANCE};
pub use strategies::{OptimizationStrategy, StrategyPreset};

use crate::cache::hash_query;
use serde::Serialize;
use serde_json::Value;
use std::sync::{LazyLock, Mutex, PoisonError};
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Characters per token in the size proxy
const CHARS_PER_TOKEN: usize = 3;

static ENCODER: LazyLock<Mutex<Option<CoreBPE>>> = LazyLock::new(|| {
    let encoder = tiktoken_rs::cl100k_base()
        .map_err(|e| warn!("Token encoder unavailable, using size proxy: {}", e))
        .ok();
    Mutex::new(encoder)
});

/// What the optimizer did to a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationMetadata {
    pub strategy: OptimizationStrategy,
    /// Estimated tokens before shrinking
    pub original_size: usize,
    /// Estimated tokens after shrinking
    pub optimized_size: usize,
    pub reduction_percent: f64,
    pub included_categories: Vec<DataCategory>,
    pub confidence: f64,
    pub relevance: RelevanceMap,
    pub analysis: QueryAnalysis,
}

impl OptimizationMetadata {
    pub fn tokens_saved(&self) -> usize {
        self.original_size.saturating_sub(self.optimized_size)
    }
}

/// A shrunk snapshot ready to be sent to the model
#[derive(Debug, Clone, Serialize)]
pub struct OptimizedContext {
    pub data: Value,
    pub metadata: OptimizationMetadata,
}

impl OptimizedContext {
    /// Compact fingerprint of the shrunk data, used in cache keys
    pub fn fingerprint(&self) -> String {
        context_fingerprint(&self.data)
    }
}

/// Token proxy: serialized JSON length divided by three, rounded up
pub fn estimate_data_size(data: &Value) -> usize {
    serde_json::to_string(data)
        .map(|s| s.len().div_ceil(CHARS_PER_TOKEN))
        .unwrap_or(0)
}

/// Exact cl100k token count, falling back to the size proxy
pub fn count_tokens(text: &str) -> usize {
    let encoder = ENCODER.lock().unwrap_or_else(PoisonError::into_inner);
    match encoder.as_ref() {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => text.len().div_ceil(CHARS_PER_TOKEN),
    }
}

/// Short identifier summarising a snapshot's content
pub fn context_fingerprint(data: &Value) -> String {
    let serialized = serde_json::to_string(data).unwrap_or_default();
    hash_query(&serialized)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_estimate_data_size() {
        assert_eq!(estimate_data_size(&json!({})), 1);
        // {"a":1} is 7 chars
        assert_eq!(estimate_data_size(&json!({"a": 1})), 3);
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        let tokens = count_tokens("How many recipes are in the system?");
        assert!(tokens > 0 && tokens < 20);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = context_fingerprint(&json!({"recipes": {"count": 40}}));
        let b = context_fingerprint(&json!({"recipes": {"count": 41}}));
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
        assert_eq!(a, context_fingerprint(&json!({"recipes": {"count": 40}})));
    }
}
