//! Configuration management for the MRP AI optimizer
//!
//! Supports configuration via:
//! 1. Config file (~/.config/mrp-ai-optimizer/config.toml)
//! 2. Environment variables (OPENAI_API_KEY, MRP_AI_CACHE_MAX_SIZE, etc.)
//! 3. CLI arguments (override file/env settings)

use crate::api::{OpenAiConfig, DEFAULT_BASE_URL};
use crate::cache::CacheConfig;
use crate::metrics::FileUsageStore;
use crate::optimization::DEFAULT_RECENT_DAYS;
use crate::selector::{default_tiers, ModelTierSpec, ScoringWeights, SelectionOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion endpoint settings
    pub api: ApiSettings,

    /// Response cache settings
    pub cache: CacheSettings,

    /// Model tier selection settings
    pub selector: SelectorSettings,

    /// Context shrinking settings
    pub context: ContextSettings,

    /// Where persisted state lives
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// API key (can also use OPENAI_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether answers are cached at all
    pub enabled: bool,

    /// How long an answer stays fresh
    pub duration_secs: u64,

    /// Maximum number of cached answers
    pub max_size: usize,

    /// Period of the background sweep
    pub cleanup_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_secs: 60 * 60,
            max_size: 100,
            cleanup_interval_secs: 15 * 60,
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .cache_duration(Duration::from_secs(self.duration_secs))
            .max_size(self.max_size)
            .cleanup_interval(Duration::from_secs(self.cleanup_interval_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub prioritize_speed: bool,
    pub prioritize_cost: bool,
    pub prioritize_accuracy: bool,

    /// Budget ceiling per request in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost_per_request: Option<f64>,

    /// Score contributions
    pub weights: ScoringWeights,

    /// Model tier table
    pub tiers: Vec<ModelTierSpec>,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            prioritize_speed: false,
            prioritize_cost: false,
            prioritize_accuracy: false,
            max_cost_per_request: None,
            weights: ScoringWeights::default(),
            tiers: default_tiers(),
        }
    }
}

impl SelectorSettings {
    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            prioritize_speed: self.prioritize_speed,
            prioritize_cost: self.prioritize_cost,
            prioritize_accuracy: self.prioritize_accuracy,
            max_cost: self.max_cost_per_request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Window in days for "recent" queries
    pub recent_days: i64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            recent_days: DEFAULT_RECENT_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Usage stats file (default: data dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_stats_path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn usage_stats_path(&self) -> PathBuf {
        self.usage_stats_path
            .clone()
            .unwrap_or_else(FileUsageStore::default_path)
    }
}

impl Config {
    /// Get default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mrp-ai-optimizer")
            .join("config.toml")
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path())
    }

    /// Load config from specific path
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default().with_env_overrides());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(value) = lookup("MRP_AI_CACHE_DURATION_SECS") {
            match value.parse() {
                Ok(secs) => self.cache.duration_secs = secs,
                Err(_) => warn!("Ignoring invalid MRP_AI_CACHE_DURATION_SECS: {}", value),
            }
        }
        if let Some(value) = lookup("MRP_AI_CACHE_MAX_SIZE") {
            match value.parse() {
                Ok(size) => self.cache.max_size = size,
                Err(_) => warn!("Ignoring invalid MRP_AI_CACHE_MAX_SIZE: {}", value),
            }
        }

        self
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path())
    }

    /// Save config to specific path
    pub fn save_to(&self, path: PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.duration_secs == 0 {
            return Err(ConfigError::Invalid("cache.duration_secs must be positive".into()));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cache.cleanup_interval_secs must be positive".into(),
            ));
        }
        if self.selector.tiers.is_empty() {
            return Err(ConfigError::Invalid("selector.tiers must not be empty".into()));
        }
        for tier in &self.selector.tiers {
            if tier.cost_per_1k_input < 0.0 || tier.cost_per_1k_output < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "tier {} has a negative price",
                    tier.name
                )));
            }
            if tier.max_context_tokens == 0 {
                return Err(ConfigError::Invalid(format!(
                    "tier {} has no context window",
                    tier.name
                )));
            }
        }
        if matches!(self.selector.max_cost_per_request, Some(max) if max <= 0.0) {
            return Err(ConfigError::Invalid(
                "selector.max_cost_per_request must be positive".into(),
            ));
        }
        if self.context.recent_days <= 0 {
            return Err(ConfigError::Invalid("context.recent_days must be positive".into()));
        }

        Ok(())
    }

    /// Get API key (from config or env)
    pub fn api_key(&self) -> Option<String> {
        self.api
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    /// Settings for the completion client; fails without an API key
    pub fn openai_config(&self) -> Result<OpenAiConfig, ConfigError> {
        let api_key = self.api_key().ok_or_else(|| {
            ConfigError::MissingRequired("API key (set OPENAI_API_KEY or api.api_key)".into())
        })?;
        Ok(OpenAiConfig {
            api_key,
            base_url: Some(self.api.base_url.clone()),
            timeout: Duration::from_secs(self.api.timeout_secs),
        })
    }

    /// Generate example config content
    pub fn example() -> String {
        let example = Config::default();
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

/// Builder for creating Config programmatically
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn cache_duration_secs(mut self, secs: u64) -> Self {
        self.config.cache.duration_secs = secs;
        self
    }

    pub fn cache_max_size(mut self, size: usize) -> Self {
        self.config.cache.max_size = size;
        self
    }

    pub fn max_cost_per_request(mut self, max: f64) -> Self {
        self.config.selector.max_cost_per_request = Some(max);
        self
    }

    pub fn prioritize_cost(mut self, enabled: bool) -> Self {
        self.config.selector.prioritize_cost = enabled;
        self
    }

    pub fn tiers(mut self, tiers: Vec<ModelTierSpec>) -> Self {
        self.config.selector.tiers = tiers;
        self
    }

    pub fn recent_days(mut self, days: i64) -> Self {
        self.config.context.recent_days = days;
        self
    }

    pub fn usage_stats_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.usage_stats_path = Some(path.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.duration_secs, 3600);
        assert_eq!(config.cache.max_size, 100);
        assert_eq!(config.cache.cleanup_interval_secs, 900);
        assert_eq!(config.context.recent_days, 30);
        assert_eq!(config.selector.tiers.len(), 3);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .api_key("sk-test")
            .cache_max_size(10)
            .max_cost_per_request(0.05)
            .prioritize_cost(true)
            .build();

        assert_eq!(config.api.api_key, Some("sk-test".to_string()));
        assert_eq!(config.cache.max_size, 10);
        let options = config.selector.selection_options();
        assert!(options.prioritize_cost);
        assert_eq!(options.max_cost, Some(0.05));
    }

    #[test]
    fn test_cache_config_conversion() {
        let cache = ConfigBuilder::new().cache_duration_secs(120).build().cache.to_cache_config();
        assert_eq!(cache.cache_duration, Duration::from_secs(120));
        assert_eq!(cache.cleanup_interval, Duration::from_secs(900));
    }

    #[test]
    fn test_example_config_round_trip() {
        let example = Config::example();
        assert!(example.contains("[cache]"));
        assert!(example.contains("[[selector.tiers]]"));

        let parsed: Config = toml::from_str(&example).expect("example parses");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            max_size = 5

            [selector.weights]
            cost = 45.0
            "#,
        )
        .expect("parses");
        assert_eq!(config.cache.max_size, 5);
        assert_eq!(config.cache.duration_secs, 3600);
        assert_eq!(config.selector.weights.cost, 45.0);
        assert_eq!(config.selector.weights.use_case_match, 50.0);
        assert_eq!(config.selector.tiers.len(), 3);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("MRP_AI_CACHE_DURATION_SECS", "600"),
            ("MRP_AI_CACHE_MAX_SIZE", "lots"),
        ]);
        let config = Config::default().with_overrides_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.cache.duration_secs, 600);
        assert_eq!(config.cache.max_size, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert_err!(ConfigBuilder::new().cache_duration_secs(0).build().validate());
        assert_err!(ConfigBuilder::new().tiers(Vec::new()).build().validate());
        assert_err!(ConfigBuilder::new().max_cost_per_request(0.0).build().validate());
        assert_err!(ConfigBuilder::new().recent_days(0).build().validate());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let config = ConfigBuilder::new().cache_max_size(42).recent_days(7).build();

        assert_ok!(config.save_to(path.clone()));
        let loaded = assert_ok!(Config::load_from(path));
        assert_eq!(loaded.cache.max_size, 42);
        assert_eq!(loaded.context.recent_days, 7);
    }

    #[test]
    fn test_openai_config_from_builder() {
        let config = ConfigBuilder::new()
            .api_key("sk-test")
            .base_url("http://localhost:8080/v1")
            .build();
        let openai = assert_ok!(config.openai_config());
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }
}
