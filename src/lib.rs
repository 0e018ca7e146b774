//! MRP AI Optimizer - cost and latency layer for business-data questions
//!
//! Sits between an MRP assistant and a hosted language model and makes each
//! question cheaper and faster to answer.
//!
//! ## Key Features
//!
//! - **Response Cache**: Bounded, expiring cache with near-duplicate query matching
//! - **Model Selection**: Scores model tiers by use case, speed, cost and context fit
//! - **Context Optimization**: Shrinks business snapshots to what the question needs
//! - **Usage Tracking**: Persistent per-model cost and latency counters
//! - **Optimization Manager**: One pipeline tying the pieces together, with reports

pub mod api;
pub mod cache;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod optimization;
pub mod selector;
pub mod tui;

pub use api::{ApiError, CompletionProvider, CompletionRequest, CompletionResponse, OpenAiClient};
pub use cache::{CacheConfig, CacheStats, CachedResponse, FetchOptions, ResponseCache};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use manager::{AskOptions, AssistantAnswer, Health, OptimizationManager, SystemStatus};
pub use metrics::{FileUsageStore, MemoryUsageStore, UsageStats, UsageStore};
pub use optimization::{ContextOptimizer, OptimizationStrategy, OptimizedContext};
pub use selector::{ComplexityTier, ModelConfig, ModelSelector, ModelTierSpec, SelectionOptions};
