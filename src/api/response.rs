//! Completion response structures

use serde::{Deserialize, Serialize};

/// Answer returned by a completion provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated content
    pub content: String,

    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,

    /// Model that generated the response
    pub model: String,

    pub finish_reason: Option<FinishReason>,
}

impl CompletionResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            model: model.into(),
            finish_reason: None,
        }
    }

    /// Whether the answer was cut off by the token limit
    pub fn truncated(&self) -> bool {
        self.finish_reason == Some(FinishReason::Length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the response
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
    /// Estimated cost in USD (if available)
    pub estimated_cost_usd: Option<f64>,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            estimated_cost_usd: None,
        }
    }

    pub fn with_cost(mut self, cost_per_1k_input: f64, cost_per_1k_output: f64) -> Self {
        let input_cost = (self.prompt_tokens as f64 / 1000.0) * cost_per_1k_input;
        let output_cost = (self.completion_tokens as f64 / 1000.0) * cost_per_1k_output;
        self.estimated_cost_usd = Some(input_cost + output_cost);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_cost() {
        let usage = TokenUsage::new(2000, 500).with_cost(0.0025, 0.01);
        assert_eq!(usage.total_tokens, 2500);
        let cost = usage.estimated_cost_usd.unwrap_or_default();
        assert!((cost - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_finish_reason() {
        assert_eq!(FinishReason::parse("length"), FinishReason::Length);
        assert_eq!(FinishReason::parse("tool_calls"), FinishReason::Other);

        let mut response = CompletionResponse::new("hi", "gpt-4o");
        assert!(!response.truncated());
        response.finish_reason = Some(FinishReason::Length);
        assert!(response.truncated());
    }
}
