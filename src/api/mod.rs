//! Model completion layer
//!
//! The optimizer never talks HTTP itself; it hands a [`CompletionRequest`]
//! to a [`CompletionProvider`]. [`OpenAiClient`] is the production
//! implementation for OpenAI-compatible chat completion endpoints.

mod client;
mod request;
mod response;

pub use client::{OpenAiClient, OpenAiConfig, DEFAULT_BASE_URL};
pub use request::{CompletionRequest, Message, Role};
pub use response::{CompletionResponse, FinishReason, TokenUsage};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Something that can answer a chat completion request
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}
