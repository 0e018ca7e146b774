//! Bounded, expiring cache of model responses with near-duplicate key matching

use super::similarity::{hash_query, normalize_query, word_set_similarity};
use super::tracker::{CacheMetrics, CacheStats};
use super::{
    CacheConfig, CacheEntry, CacheMetadata, CacheSource, CachedResponse, FetchOptions,
    EVICTION_FRACTION, SIMILARITY_THRESHOLD, SWEEP_OCCUPANCY_THRESHOLD,
};
use regex::RegexSet;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Language that makes an answer specific to the moment or to the asker
static NON_CACHEABLE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\btoday\b",
        r"\bnow\b",
        r"\breal[- ]?time\b",
        r"\bmy\b",
        r"\bfor me\b",
        r"\bdzisiaj\b",
        r"\bdziś\b",
        r"\bteraz\b",
        r"\baktualn",
        r"\bm(?:ój|oja|oje|oich|oim|ojego)\b",
        r"\bdla mnie\b",
    ])
    .expect("non-cacheable patterns are valid")
});

/// Returns false for queries whose answers must not be reused across callers or time
pub fn is_cacheable_query(query: &str) -> bool {
    !NON_CACHEABLE.is_match(&query.to_lowercase())
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    metrics: CacheMetrics,
    config: CacheConfig,
}

impl CacheState {
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            metrics: CacheMetrics::default(),
            config,
        }
    }

    /// Remove the `count` entries with the oldest creation time
    fn evict_oldest(&mut self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }

        let mut by_age: Vec<_> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.created_at))
            .collect();
        by_age.sort_by_key(|(_, created)| *created);

        let mut removed = 0;
        for (key, _) in by_age.into_iter().take(count) {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }

        self.metrics.record_evictions(removed);
        removed
    }

    fn eviction_batch(&self) -> usize {
        (self.entries.len() as f64 * EVICTION_FRACTION).ceil() as usize
    }

    fn remove_expired(&mut self) -> usize {
        let duration = self.config.cache_duration;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(duration));
        let removed = before - self.entries.len();
        self.metrics.record_expired(removed);
        removed
    }

    fn sweep(&mut self) -> usize {
        let mut removed = self.remove_expired();

        let threshold = self.config.max_size as f64 * SWEEP_OCCUPANCY_THRESHOLD;
        if self.entries.len() as f64 > threshold {
            let batch = self.eviction_batch();
            removed += self.evict_oldest(batch);
        }

        self.metrics.record_cleanup();
        removed
    }
}

/// Response cache keyed by normalized query and context fingerprint.
///
/// Clones share the same underlying store. All state sits behind a single
/// mutex that is never held across an await, so the periodic sweep cannot
/// interleave with a lookup or insert.
#[derive(Clone)]
pub struct ResponseCache {
    state: Arc<Mutex<CacheState>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::new(config))),
            timer: Arc::new(Mutex::new(None)),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a cached response for the query or fetch, store and return a fresh one.
    ///
    /// Errors from `fetch` propagate unchanged and nothing is written.
    pub async fn get_cached_or_fetch<F, Fut, E>(
        &self,
        query: &str,
        context_fingerprint: &str,
        fetch: F,
        options: &FetchOptions,
    ) -> Result<CachedResponse, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if options.bypasses_cache() {
            debug!("Cache bypassed for query");
            let text = fetch().await?;
            return Ok(CachedResponse {
                text,
                key: None,
                source: CacheSource::Bypassed,
            });
        }

        self.start_cleanup_timer();

        let key = self.generate_key(query, context_fingerprint);

        if let Some(hit) = self.lookup(&key, options.estimated_cost) {
            return Ok(hit);
        }

        let text = fetch().await?;
        self.store(&key, query, context_fingerprint, &text, options.estimated_cost);

        Ok(CachedResponse {
            text,
            key: Some(key),
            source: CacheSource::Miss,
        })
    }

    /// Compute the cache key for a query.
    ///
    /// Any live entry whose normalized query is at least
    /// [`SIMILARITY_THRESHOLD`] similar donates its key, whatever its
    /// fingerprint. This scans every entry, which is fine at the configured
    /// capacities.
    pub fn generate_key(&self, query: &str, context_fingerprint: &str) -> String {
        let normalized = normalize_query(query);
        let state = self.state();
        let duration = state.config.cache_duration;

        let similar = state
            .entries
            .values()
            .filter(|e| !e.is_expired(duration))
            .map(|e| {
                let sim = word_set_similarity(&normalized, &e.metadata.normalized_query);
                (e, sim)
            })
            .filter(|(_, sim)| *sim >= SIMILARITY_THRESHOLD)
            .max_by(|(a, sim_a), (b, sim_b)| {
                sim_a
                    .partial_cmp(sim_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.created_at.cmp(&b.created_at))
            });

        if let Some((entry, sim)) = similar {
            debug!(similarity = sim, key = %entry.key, "Reusing key of similar query");
            return entry.key.clone();
        }

        format!("{}_{}", hash_query(&normalized), context_fingerprint)
    }

    /// Look up a key, counting the hit or miss. Expired entries are removed.
    pub fn lookup(&self, key: &str, estimated_cost: f64) -> Option<CachedResponse> {
        let mut state = self.state();
        let duration = state.config.cache_duration;

        let status = state.entries.get(key).map(|entry| {
            if entry.is_expired(duration) {
                None
            } else {
                Some((entry.response.clone(), entry.age()))
            }
        });

        match status {
            Some(Some((text, age))) => {
                state.metrics.record_hit(estimated_cost);
                debug!(key, "Cache hit");
                return Some(CachedResponse {
                    text,
                    key: Some(key.to_string()),
                    source: CacheSource::Hit { age },
                });
            }
            Some(None) => {
                state.entries.remove(key);
                state.metrics.record_expired(1);
                debug!(key, "Cache entry expired");
            }
            None => {}
        }

        state.metrics.record_miss();
        debug!(key, "Cache miss");
        None
    }

    /// Store a response, evicting the oldest entries first if the cache is full
    pub fn store(
        &self,
        key: &str,
        query: &str,
        context_fingerprint: &str,
        response: &str,
        estimated_cost: f64,
    ) {
        let mut state = self.state();
        let max_size = state.config.max_size;

        if max_size == 0 {
            return;
        }

        if !state.entries.contains_key(key) && state.entries.len() >= max_size {
            let needed = state.entries.len() + 1 - max_size;
            let batch = state.eviction_batch().max(needed);
            let removed = state.evict_oldest(batch);
            info!(removed, "Cache full, evicted oldest entries");
        }

        let entry = CacheEntry {
            key: key.to_string(),
            response: response.to_string(),
            created_at: Instant::now(),
            metadata: CacheMetadata::new(
                query,
                normalize_query(query),
                context_fingerprint,
                estimated_cost,
            ),
        };
        state.entries.insert(key.to_string(), entry);
        state.metrics.record_write();
    }

    /// Whether answers to this query may be reused
    pub fn should_cache(&self, query: &str) -> bool {
        is_cacheable_query(query)
    }

    /// Remove expired entries, then trim the oldest 20% if still above 80% full.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let removed = self.state().sweep();
        if removed > 0 {
            debug!(removed, "Cache sweep removed entries");
        }
        removed
    }

    /// Start the periodic sweep if it is not already running.
    ///
    /// Requires a Tokio runtime; without one the call does nothing.
    pub fn start_cleanup_timer(&self) {
        let mut timer = self.timer();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No Tokio runtime, cache sweep timer not started");
            return;
        };

        let interval = self.state().config.cleanup_interval;
        if interval.is_zero() {
            warn!("Cache cleanup interval is zero, sweep timer disabled");
            return;
        }

        let weak = Arc::downgrade(&self.state);
        let first_tick = Instant::now() + interval;
        *timer = Some(runtime.spawn(run_sweeper(weak, first_tick, interval)));
        debug!(interval_secs = interval.as_secs(), "Cache sweep timer started");
    }

    /// Stop the periodic sweep
    pub fn stop_cleanup_timer(&self) {
        if let Some(handle) = self.timer().take() {
            handle.abort();
            debug!("Cache sweep timer stopped");
        }
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Apply a new configuration, shrinking the store if the capacity dropped
    pub fn configure(&self, config: CacheConfig) {
        let interval_changed = {
            let mut state = self.state();
            let changed = state.config.cleanup_interval != config.cleanup_interval;
            state.config = config;

            let max_size = state.config.max_size;
            if state.entries.len() > max_size {
                let excess = state.entries.len() - max_size;
                state.evict_oldest(excess);
            }
            changed
        };

        if interval_changed && self.is_timer_running() {
            self.stop_cleanup_timer();
            self.start_cleanup_timer();
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.state().config.clone()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.state().entries.clear();
    }

    pub fn reset_stats(&self) {
        self.state().metrics = CacheMetrics::default();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats::from_metrics(&state.metrics, state.entries.len(), state.config.max_size)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

async fn run_sweeper(state: Weak<Mutex<CacheState>>, first_tick: Instant, interval: Duration) {
    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            break;
        };
        let removed = state.lock().unwrap_or_else(PoisonError::into_inner).sweep();
        if removed > 0 {
            debug!(removed, "Periodic cache sweep removed entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn cache_with(duration_secs: u64, max_size: usize) -> ResponseCache {
        ResponseCache::new(
            CacheConfig::new()
                .cache_duration(Duration::from_secs(duration_secs))
                .max_size(max_size)
                .cleanup_interval(Duration::from_secs(24 * 60 * 60)),
        )
    }

    async fn fetch_counted(
        cache: &ResponseCache,
        query: &str,
        calls: &AtomicUsize,
        answer: &str,
    ) -> CachedResponse {
        let answer = answer.to_string();
        let result: Result<CachedResponse, String> = cache
            .get_cached_or_fetch(
                query,
                "fp",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(answer)
                },
                &FetchOptions::default(),
            )
            .await;
        result.expect("fetch succeeds")
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cache = cache_with(3600, 100);
        let calls = AtomicUsize::new(0);

        let first = fetch_counted(&cache, "Ile jest receptur w systemie?", &calls, "40").await;
        let second = fetch_counted(&cache, "Ile jest receptur w systemie?", &calls, "41").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.source, CacheSource::Miss);
        assert!(second.is_hit());
        assert_eq!(first.text, second.text);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        cache.stop_cleanup_timer();
    }

    #[tokio::test]
    async fn test_near_duplicate_queries_share_key() {
        let cache = cache_with(3600, 100);
        let calls = AtomicUsize::new(0);

        fetch_counted(&cache, "How many recipes exist?", &calls, "40").await;

        let key_a = cache.generate_key("How many recipes exist?", "fp");
        let key_b = cache.generate_key("how many recipes exist", "fp");
        assert_eq!(key_a, key_b);

        // 4 of 5 words shared: 0.8 similarity
        let key_c = cache.generate_key("how many recipes exist here", "fp");
        assert_eq!(key_a, key_c);

        let key_d = cache.generate_key("list all suppliers", "fp");
        assert_ne!(key_a, key_d);
        cache.stop_cleanup_timer();
    }

    #[test]
    fn test_similar_query_reuses_key_across_fingerprints() {
        let cache = cache_with(3600, 100);
        cache.store("k", "How many recipes exist?", "fpA", "40", 0.0);

        assert_eq!(cache.generate_key("how many recipes exist", "fpB"), "k");
        assert!(cache
            .generate_key("list all suppliers", "fpB")
            .ends_with("_fpB"));
    }

    #[test]
    fn test_key_contains_fingerprint() {
        let cache = cache_with(3600, 100);
        let key = cache.generate_key("Ile jest receptur?", "abc123");
        assert!(key.ends_with("_abc123"));
        assert_ne!(key, cache.generate_key("Ile jest receptur?", "other"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_duration() {
        let cache = cache_with(60, 100);
        cache.store("a", "query a", "fp", "answer a", 0.0);
        cache.store("b", "query b", "fp", "answer b", 0.0);

        tokio::time::advance(Duration::from_millis(60_001)).await;

        assert!(cache.lookup("a", 0.0).is_none());
        assert_eq!(cache.len(), 1);

        cache.sweep();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_fresh_just_before_expiry() {
        let cache = cache_with(60, 100);
        cache.store("a", "query a", "fp", "answer a", 0.0);

        tokio::time::advance(Duration::from_secs(59)).await;
        let hit = cache.lookup("a", 0.0).expect("still fresh");
        assert_eq!(hit.source, CacheSource::Hit { age: Duration::from_secs(59) });
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = cache_with(3600, 10);
        for i in 0..10 {
            cache.store(&format!("k{i}"), &format!("query {i}"), "fp", "r", 0.0);
            tokio::time::advance(Duration::from_secs(1)).await;
        }
        assert_eq!(cache.len(), 10);

        cache.store("k10", "query 10", "fp", "r", 0.0);

        // 20% of 10 evicted, then one inserted
        assert_eq!(cache.len(), 9);
        assert!(cache.lookup("k0", 0.0).is_none());
        assert!(cache.lookup("k1", 0.0).is_none());
        assert!(cache.lookup("k2", 0.0).is_some());
        assert!(cache.lookup("k10", 0.0).is_some());
    }

    #[test]
    fn test_capacity_bound_with_tiny_cache() {
        let cache = cache_with(3600, 2);
        for i in 0..5 {
            cache.store(&format!("k{i}"), &format!("q{i}"), "fp", "r", 0.0);
            assert!(cache.len() <= 2);
        }
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = cache_with(3600, 2);
        cache.store("a", "qa", "fp", "1", 0.0);
        cache.store("b", "qb", "fp", "2", 0.0);
        cache.store("b", "qb", "fp", "3", 0.0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_trims_when_nearly_full() {
        let cache = cache_with(3600, 10);
        for i in 0..9 {
            cache.store(&format!("k{i}"), &format!("q{i}"), "fp", "r", 0.0);
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        // 9 > 8 (80% of 10), ceil(20% of 9) = 2 removed
        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 7);
        assert_eq!(cache.stats().cleanups, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_removes_expired() {
        let cache = ResponseCache::new(
            CacheConfig::new()
                .cache_duration(Duration::from_secs(30))
                .cleanup_interval(Duration::from_secs(60)),
        );
        let calls = AtomicUsize::new(0);
        fetch_counted(&cache, "lista dostawców", &calls, "3").await;
        assert!(cache.is_timer_running());
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.len(), 0);
        assert!(cache.stats().cleanups >= 1);

        cache.stop_cleanup_timer();
        assert!(!cache.is_timer_running());
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let cache = cache_with(3600, 100);

        let result: Result<CachedResponse, String> = cache
            .get_cached_or_fetch(
                "Ile jest zamówień?",
                "fp",
                || async { Err("upstream 500".to_string()) },
                &FetchOptions::default(),
            )
            .await;

        let err = assert_err!(result);
        assert_eq!(err, "upstream 500");
        assert!(cache.is_empty());
        cache.stop_cleanup_timer();
    }

    #[tokio::test]
    async fn test_skip_cache_always_fetches() {
        let cache = cache_with(3600, 100);
        let calls = AtomicUsize::new(0);
        let options = FetchOptions::default().skip();

        for _ in 0..2 {
            let result: Result<CachedResponse, String> = cache
                .get_cached_or_fetch(
                    "Ile jest receptur?",
                    "fp",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("40".to_string())
                    },
                    &options,
                )
                .await;
            let response = assert_ok!(result);
            assert_eq!(response.source, CacheSource::Bypassed);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().total_lookups(), 0);
    }

    #[tokio::test]
    async fn test_hit_credits_estimated_cost() {
        let cache = cache_with(3600, 100);
        let options = FetchOptions::default().with_estimated_cost(0.25);

        for _ in 0..3 {
            let result: Result<CachedResponse, String> = cache
                .get_cached_or_fetch("Pokaż receptury", "fp", || async { Ok("x".to_string()) }, &options)
                .await;
            assert_ok!(result);
        }

        assert!((cache.stats().cost_saved - 0.5).abs() < 1e-9);
        cache.stop_cleanup_timer();
    }

    #[test]
    fn test_should_cache_rejects_time_and_personal_language() {
        let cache = ResponseCache::default();
        assert!(cache.should_cache("Ile jest receptur w systemie?"));
        assert!(cache.should_cache("How many recipes do we know?"));
        assert!(!cache.should_cache("What is the stock right now?"));
        assert!(!cache.should_cache("Show today's orders"));
        assert!(!cache.should_cache("Real-time production status"));
        assert!(!cache.should_cache("Show my orders"));
        assert!(!cache.should_cache("Zrób raport dla mnie"));
        assert!(!cache.should_cache("Jakie zamówienia są dzisiaj?"));
        assert!(!cache.should_cache("Pokaż moje zadania"));
    }

    #[test]
    fn test_configure_shrinks_store() {
        let cache = cache_with(3600, 10);
        for i in 0..8 {
            cache.store(&format!("k{i}"), &format!("q{i}"), "fp", "r", 0.0);
        }

        cache.configure(CacheConfig::new().max_size(5));
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.config().max_size, 5);
    }

    #[test]
    fn test_timer_not_started_without_runtime() {
        let cache = ResponseCache::default();
        cache.start_cleanup_timer();
        assert!(!cache.is_timer_running());
    }
}
