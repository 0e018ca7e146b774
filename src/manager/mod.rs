//! Optimization manager
//!
//! Façade that owns the response cache, the model selector and the context
//! optimizer and runs them as one pipeline: shrink the context, pick a model
//! tier, answer from cache or call the completion provider, record usage.

mod report;
mod sample;

pub use report::{
    recommendations, ExpectedImprovements, Health, PerformanceReport, PerformanceTestReport,
    QueryBenchmark, SystemStatus, EXPECTED_IMPROVEMENTS, HIGH_OCCUPANCY, LOW_HIT_RATE,
};
pub use sample::{sample_snapshot, SAMPLE_QUERIES};

use crate::api::{ApiError, CompletionProvider, CompletionRequest};
use crate::cache::{CacheConfig, CacheSource, FetchOptions, ResponseCache};
use crate::config::Config;
use crate::metrics::FileUsageStore;
use crate::optimization::{count_tokens, ContextOptimizer, OptimizationMetadata, OptimizedContext};
use crate::selector::{
    ComplexityTier, ModelConfig, ModelSelector, QueryCharacteristics, SelectionOptions,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are an assistant for a manufacturing resource planning (MRP) \
system. Answer using only the business data provided. Be concise and answer in the language \
of the question.";

/// Per-call options for [`OptimizationManager::ask`]
#[derive(Debug, Clone)]
pub struct AskOptions {
    pub selection: SelectionOptions,
    /// Forces the complexity used for both context shrinking and tier choice
    pub complexity_hint: Option<ComplexityTier>,
    pub enable_cache: bool,
    pub skip_cache: bool,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            selection: SelectionOptions::default(),
            complexity_hint: None,
            enable_cache: true,
            skip_cache: false,
        }
    }
}

/// Answer to a business question plus what the pipeline did to produce it
#[derive(Debug, Clone, Serialize)]
pub struct AssistantAnswer {
    pub text: String,
    /// Text with the cache freshness note appended on hits
    pub annotated_text: String,
    pub model: String,
    pub from_cache: bool,
    #[serde(skip)]
    pub source: CacheSource,
    pub estimated_cost: f64,
    pub optimization: OptimizationMetadata,
    pub elapsed_ms: u64,
}

/// Shrunk context and model choice for one query
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub context: OptimizedContext,
    pub model: ModelConfig,
}

pub struct OptimizationManager {
    cache: ResponseCache,
    selector: ModelSelector,
    optimizer: ContextOptimizer,
}

impl OptimizationManager {
    pub fn new(cache: ResponseCache, selector: ModelSelector, optimizer: ContextOptimizer) -> Self {
        Self {
            cache,
            selector,
            optimizer,
        }
    }

    /// Build the pipeline from a loaded configuration, persisting usage to disk
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(FileUsageStore::new(config.storage.usage_stats_path()));
        let selector = ModelSelector::new(
            config.selector.tiers.clone(),
            config.selector.weights.clone(),
            store,
        );
        Self::new(
            ResponseCache::new(config.cache.to_cache_config()),
            selector,
            ContextOptimizer::new(config.context.recent_days),
        )
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn optimizer(&self) -> &ContextOptimizer {
        &self.optimizer
    }

    /// Apply cache settings. Safe to call repeatedly.
    pub fn initialize(&self, config: CacheConfig) {
        info!(
            duration_secs = config.cache_duration.as_secs(),
            max_size = config.max_size,
            cleanup_secs = config.cleanup_interval.as_secs(),
            "Initializing optimization layer"
        );
        self.cache.configure(config);
    }

    /// Shrink the context and pick a model tier for a query, without calling
    /// the provider. The same complexity drives both steps.
    pub fn plan(
        &self,
        query: &str,
        data: &Value,
        complexity_hint: Option<ComplexityTier>,
        selection: &SelectionOptions,
    ) -> QueryPlan {
        let complexity =
            complexity_hint.unwrap_or_else(|| QueryCharacteristics::analyze(query).complexity_tier());
        let context = self
            .optimizer
            .prepare_optimal_context(query, data, Some(complexity));
        let model = self.selector.select_optimal_model(
            query,
            context.metadata.optimized_size,
            complexity_hint,
            selection,
        );
        QueryPlan { context, model }
    }

    /// Answer a question about the business data through the full pipeline.
    ///
    /// Only a failing completion call surfaces as an error; nothing is cached
    /// or recorded in that case.
    pub async fn ask(
        &self,
        query: &str,
        data: &Value,
        provider: &dyn CompletionProvider,
        options: &AskOptions,
    ) -> Result<AssistantAnswer, ApiError> {
        let started = Instant::now();

        let QueryPlan { context, model } =
            self.plan(query, data, options.complexity_hint, &options.selection);

        let context_json = serde_json::to_string(&context.data)?;
        let request = CompletionRequest::new(model.model_name())
            .with_system(SYSTEM_PROMPT)
            .with_user(format!(
                "Business data (JSON):\n{}\n\nQuestion: {}",
                context_json, query
            ))
            .with_temperature(model.temperature)
            .with_max_tokens(model.max_output_tokens);

        let fetch_options = FetchOptions {
            enable_cache: options.enable_cache && self.cache.should_cache(query),
            skip_cache: options.skip_cache,
            estimated_cost: model.estimated_cost,
        };

        let selector = &self.selector;
        let tier = &model.tier;
        let fallback_cost = model.estimated_cost;
        let fetch = move || async move {
            let call_started = Instant::now();
            let response = provider.complete(request).await.map_err(|e| {
                warn!(provider = provider.name(), "Completion failed: {}", e);
                e
            })?;
            let elapsed_ms = call_started.elapsed().as_millis() as u64;

            let cost = response
                .usage
                .clone()
                .and_then(|u| {
                    u.with_cost(tier.cost_per_1k_input, tier.cost_per_1k_output)
                        .estimated_cost_usd
                })
                .unwrap_or(fallback_cost);
            if let Err(e) = selector.record_usage(&tier.name, cost, elapsed_ms) {
                warn!("Failed to persist usage stats: {}", e);
            }
            if response.truncated() {
                debug!(model = %tier.name, "Answer hit the output token limit");
            }
            Ok::<_, ApiError>(response.content)
        };

        let result = self
            .cache
            .get_cached_or_fetch(query, &context.fingerprint(), fetch, &fetch_options)
            .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            model = %model.model_name(),
            strategy = %context.metadata.strategy,
            cached = result.is_hit(),
            elapsed_ms,
            "Answered query"
        );

        Ok(AssistantAnswer {
            annotated_text: result.annotated_text(),
            from_cache: result.is_hit(),
            text: result.text,
            source: result.source,
            model: model.tier.name.clone(),
            estimated_cost: model.estimated_cost,
            optimization: context.metadata,
            elapsed_ms,
        })
    }

    pub fn get_performance_stats(&self) -> PerformanceReport {
        let cache = self.cache.stats();
        let usage = self.selector.get_usage_stats();
        let recommendations = recommendations(&cache, &usage);
        PerformanceReport {
            cache,
            usage,
            expected_improvements: EXPECTED_IMPROVEMENTS,
            recommendations,
        }
    }

    /// Run classification, tier selection and context shrinking for each
    /// query against the synthetic snapshot. No model is called.
    pub fn run_performance_test(&self, queries: Option<&[String]>) -> PerformanceTestReport {
        let queries: Vec<String> = match queries {
            Some(queries) => queries.to_vec(),
            None => SAMPLE_QUERIES.iter().map(|q| q.to_string()).collect(),
        };
        let data = sample_snapshot();
        let options = SelectionOptions::default();

        let results = queries
            .into_iter()
            .map(|query| {
                let started = Instant::now();
                let QueryPlan { context, model } = self.plan(&query, &data, None, &options);
                let processing_ms = started.elapsed().as_secs_f64() * 1000.0;

                let context_tokens = serde_json::to_string(&context.data)
                    .map(|s| count_tokens(&s))
                    .unwrap_or(context.metadata.optimized_size);

                QueryBenchmark {
                    model: model.tier.name.clone(),
                    strategy: context.metadata.strategy,
                    original_size: context.metadata.original_size,
                    optimized_size: context.metadata.optimized_size,
                    reduction_percent: context.metadata.reduction_percent,
                    context_tokens,
                    estimated_cost: model.estimated_cost,
                    processing_ms,
                    query,
                }
            })
            .collect();

        let report = PerformanceTestReport::from_results(results);
        info!(
            queries = report.results.len(),
            avg_ms = report.average_processing_ms,
            avg_reduction = report.average_reduction_percent,
            "Performance test finished"
        );
        report
    }

    /// Clear the cache and its counters. Persisted usage stats are kept.
    pub fn reset_optimization(&self) {
        self.cache.clear();
        self.cache.reset_stats();
        info!("Optimization cache reset");
    }

    pub fn get_system_status(&self) -> SystemStatus {
        let cache = self.cache.stats();
        let usage = self.selector.get_usage_stats();
        SystemStatus {
            health: Health::evaluate(&cache),
            hit_rate: cache.hit_rate,
            occupancy: cache.occupancy(),
            cache_size: cache.size,
            max_size: cache.max_size,
            total_lookups: cache.total_lookups(),
            cleanup_timer_running: self.cache.is_timer_running(),
            total_invocations: usage.total_invocations,
            total_cost: usage.total_cost,
        }
    }

    /// Stop background work
    pub fn shutdown(&self) {
        self.cache.stop_cleanup_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CompletionResponse, TokenUsage};
    use crate::metrics::MemoryUsageStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::assert_ok;

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionProvider for CountingProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(ApiError::Provider("503 Service Unavailable".into()));
            }
            let mut response = CompletionResponse::new(format!("answer #{n}"), request.model);
            response.usage = Some(TokenUsage::new(1000, 100));
            Ok(response)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn manager() -> OptimizationManager {
        OptimizationManager::new(
            ResponseCache::default(),
            ModelSelector::with_defaults(Arc::new(MemoryUsageStore::new())),
            ContextOptimizer::default(),
        )
    }

    #[tokio::test]
    async fn test_repeated_query_is_served_from_cache() {
        let manager = manager();
        let provider = CountingProvider::new();
        let data = sample_snapshot();
        let query = "Ile jest receptur w systemie?";

        let first = manager
            .ask(query, &data, &provider, &AskOptions::default())
            .await
            .expect("first answer");
        let second = manager
            .ask(query, &data, &provider, &AskOptions::default())
            .await
            .expect("second answer");

        assert_eq!(provider.calls(), 1);
        assert_eq!(first.text, second.text);
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(second.annotated_text.starts_with(&second.text));
        assert!(second.annotated_text.contains("served from cache"));

        assert_eq!(first.model, "gpt-4o-mini");
        assert_eq!(first.optimization.included_categories.len(), 2);

        // the provider's usage is priced on the chosen tier
        let usage = manager.selector().get_usage_stats();
        assert_eq!(usage.total_invocations, 1);
        let expected = 1.0 * 0.00015 + 0.1 * 0.0006;
        assert!((usage.total_cost - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_personal_query_bypasses_cache() {
        let manager = manager();
        let provider = CountingProvider::new();
        let data = sample_snapshot();
        let query = "Pokaż moje dzisiejsze zamówienia";

        let first = assert_ok!(manager.ask(query, &data, &provider, &AskOptions::default()).await);
        let second = assert_ok!(manager.ask(query, &data, &provider, &AskOptions::default()).await);

        assert_eq!(provider.calls(), 2);
        assert_eq!(first.source, CacheSource::Bypassed);
        assert_ne!(first.text, second.text);
        assert!(manager.cache().is_empty());
    }

    #[tokio::test]
    async fn test_skip_cache_option() {
        let manager = manager();
        let provider = CountingProvider::new();
        let data = sample_snapshot();
        let options = AskOptions {
            skip_cache: true,
            ..Default::default()
        };

        assert_ok!(manager.ask("Pokaż receptury", &data, &provider, &options).await);
        assert_ok!(manager.ask("Pokaż receptury", &data, &provider, &options).await);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_propagates_and_is_not_cached() {
        let manager = manager();
        let provider = CountingProvider::failing();
        let data = sample_snapshot();

        let result = manager
            .ask("Pokaż receptury", &data, &provider, &AskOptions::default())
            .await;

        assert!(matches!(result, Err(ApiError::Provider(_))));
        assert!(manager.cache().is_empty());
        assert_eq!(manager.selector().get_usage_stats().total_invocations, 0);
    }

    #[tokio::test]
    async fn test_reset_keeps_usage_stats() {
        let manager = manager();
        let provider = CountingProvider::new();
        let data = sample_snapshot();
        assert_ok!(manager.ask("Pokaż receptury", &data, &provider, &AskOptions::default()).await);

        manager.reset_optimization();

        assert!(manager.cache().is_empty());
        assert_eq!(manager.cache().stats().total_lookups(), 0);
        assert_eq!(manager.selector().get_usage_stats().total_invocations, 1);
        manager.shutdown();
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let manager = manager();
        let config = CacheConfig::new()
            .max_size(10)
            .cache_duration(Duration::from_secs(60));
        manager.initialize(config.clone());
        manager.initialize(config.clone());
        assert_eq!(manager.cache().config(), config);
        assert_eq!(manager.get_system_status().max_size, 10);
    }

    #[test]
    fn test_performance_test_on_sample_queries() {
        let report = manager().run_performance_test(None);
        assert_eq!(report.results.len(), SAMPLE_QUERIES.len());

        let count_query = &report.results[0];
        assert_eq!(count_query.model, "gpt-4o-mini");
        assert!(count_query.reduction_percent > 90.0);
        assert!(report.results.iter().all(|r| r.optimized_size < r.original_size));
        assert!(report.average_reduction_percent > 20.0);
    }

    #[test]
    fn test_performance_test_custom_queries() {
        let queries = vec!["Pokaż dostawców dla receptur".to_string()];
        let report = manager().run_performance_test(Some(&queries));
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].query, queries[0]);
        assert!(report.results[0].context_tokens > 0);
    }

    #[test]
    fn test_from_config_uses_file_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = crate::config::ConfigBuilder::new()
            .cache_max_size(7)
            .usage_stats_path(dir.path().join("usage.json"))
            .build();
        let manager = OptimizationManager::from_config(&config);
        assert_eq!(manager.cache().config().max_size, 7);

        assert_ok!(manager.selector().record_usage("gpt-4o", 0.25, 100));
        assert!(dir.path().join("usage.json").exists());
    }

    #[test]
    fn test_plan_matches_what_ask_sends() {
        let manager = manager();
        let data = sample_snapshot();
        let query = "Porównaj zamówienia";
        let complexity = QueryCharacteristics::analyze(query).complexity_tier();

        let plan = manager.plan(query, &data, None, &SelectionOptions::default());
        let direct = manager
            .optimizer()
            .prepare_optimal_context(query, &data, Some(complexity));

        assert_eq!(plan.context.metadata.strategy, direct.metadata.strategy);
        assert_eq!(plan.context.data, direct.data);
        assert_eq!(plan.model.complexity, complexity);
    }

    #[test]
    fn test_fresh_system_is_excellent() {
        let manager = manager();
        let status = manager.get_system_status();
        assert_eq!(status.health, Health::Excellent);
        assert_eq!(status.cache_size, 0);

        let report = manager.get_performance_stats();
        assert_eq!(report.recommendations.len(), 1);
    }
}
