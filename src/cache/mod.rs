//! Response caching for model API calls
//!
//! Answers from the completions endpoint are cached per (query, context
//! fingerprint). Near-duplicate phrasings of the same question share a slot:
//!
//! 1. **Normalization**: lowercase, punctuation stripped, whitespace collapsed
//! 2. **Approximate matching**: a live entry whose word set overlaps the new
//!    query by at least [`SIMILARITY_THRESHOLD`] donates its key
//! 3. **Bounded**: entries expire after the cache duration and the oldest 20%
//!    are evicted when capacity is reached
//! 4. **Sweeping**: a background timer removes stale entries periodically

mod response;
mod similarity;
mod tracker;

pub use response::ResponseCache;
pub use similarity::{hash_query, normalize_query, word_set_similarity};
pub use tracker::{CacheMetrics, CacheStats};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Word-set similarity at or above which two queries share a cache key
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Fraction of entries removed by a capacity eviction
pub const EVICTION_FRACTION: f64 = 0.2;

/// Occupancy above which a sweep also evicts the oldest entries
pub const SWEEP_OCCUPANCY_THRESHOLD: f64 = 0.8;

/// Maximum stored length of the display copy of the query
const METADATA_QUERY_CHARS: usize = 100;

/// Configuration for the response cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long an entry stays fresh
    pub cache_duration: Duration,
    /// Maximum number of entries
    pub max_size: usize,
    /// Period of the background sweep
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(60 * 60),
            max_size: 100,
            cleanup_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

/// Per-call cache options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// When false the cache is bypassed entirely
    pub enable_cache: bool,
    /// When true the cache is bypassed entirely
    pub skip_cache: bool,
    /// Cost of the call a hit would avoid, credited to `cost_saved`
    pub estimated_cost: f64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            enable_cache: true,
            skip_cache: false,
            estimated_cost: 0.0,
        }
    }
}

impl FetchOptions {
    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn bypasses_cache(&self) -> bool {
        !self.enable_cache || self.skip_cache
    }
}

/// Descriptive data stored alongside a cached response
#[derive(Debug, Clone, Serialize)]
pub struct CacheMetadata {
    /// Query as first seen, truncated for display
    pub query: String,
    /// Normalized query used for near-duplicate matching
    pub normalized_query: String,
    pub context_fingerprint: String,
    pub estimated_cost: f64,
}

impl CacheMetadata {
    pub(crate) fn new(query: &str, normalized: String, fingerprint: &str, cost: f64) -> Self {
        Self {
            query: query.chars().take(METADATA_QUERY_CHARS).collect(),
            normalized_query: normalized,
            context_fingerprint: fingerprint.to_string(),
            estimated_cost: cost,
        }
    }
}

/// A cached model response
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub response: String,
    pub created_at: Instant,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_expired(&self, cache_duration: Duration) -> bool {
        self.age() > cache_duration
    }
}

/// Where a response came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSource {
    /// Served from cache; `age` is how old the stored entry was
    Hit { age: Duration },
    /// Fetched from the model API and stored
    Miss,
    /// Fetched from the model API without touching the cache
    Bypassed,
}

/// Response returned by `ResponseCache::get_cached_or_fetch`
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub text: String,
    /// Cache key the response is (or would be) stored under
    pub key: Option<String>,
    pub source: CacheSource,
}

impl CachedResponse {
    pub fn is_hit(&self) -> bool {
        matches!(self.source, CacheSource::Hit { .. })
    }

    /// Response text with a freshness note appended for cache hits
    pub fn annotated_text(&self) -> String {
        match &self.source {
            CacheSource::Hit { age } => {
                format!(
                    "{}\n\n_served from cache, {} min old_",
                    self.text,
                    age.as_secs() / 60
                )
            }
            _ => self.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_duration, Duration::from_secs(3600));
        assert_eq!(config.max_size, 100);
        assert_eq!(config.cleanup_interval, Duration::from_secs(900));
    }

    #[test]
    fn test_fetch_options_bypass() {
        assert!(!FetchOptions::default().bypasses_cache());
        assert!(FetchOptions::default().skip().bypasses_cache());

        let disabled = FetchOptions {
            enable_cache: false,
            ..Default::default()
        };
        assert!(disabled.bypasses_cache());
    }

    #[test]
    fn test_annotation_only_on_hits() {
        let hit = CachedResponse {
            text: "40 receptur".to_string(),
            key: Some("k".to_string()),
            source: CacheSource::Hit {
                age: Duration::from_secs(180),
            },
        };
        assert_eq!(hit.annotated_text(), "40 receptur\n\n_served from cache, 3 min old_");

        let miss = CachedResponse {
            source: CacheSource::Miss,
            ..hit
        };
        assert_eq!(miss.annotated_text(), "40 receptur");
    }

    #[test]
    fn test_metadata_truncates_query() {
        let long = "x".repeat(500);
        let meta = CacheMetadata::new(&long, long.clone(), "fp", 0.0);
        assert_eq!(meta.query.chars().count(), METADATA_QUERY_CHARS);
        assert_eq!(meta.normalized_query.len(), 500);
    }
}
