//! HTTP client for OpenAI-compatible chat completion endpoints

use super::{
    ApiError, CompletionProvider, CompletionRequest, CompletionResponse, FinishReason, Role,
    TokenUsage,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Fallback wait when a 429 carries no Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL (default: https://api.openai.com/v1)
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Completion provider backed by `/chat/completions`
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    fn build_request(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({
                    "role": role,
                    "content": msg.content
                })
            })
            .collect();

        json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn parse_response(&self, json: Value, requested_model: &str) -> Result<CompletionResponse, ApiError> {
        let choice = &json["choices"][0];
        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| ApiError::Provider("Response carries no message content".into()))?
            .to_string();

        let usage = json["usage"].is_object().then(|| {
            TokenUsage::new(
                json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
            )
        });

        Ok(CompletionResponse {
            content,
            usage,
            model: json["model"].as_str().unwrap_or(requested_model).to_string(),
            finish_reason: choice["finish_reason"].as_str().map(FinishReason::parse),
        })
    }
}

fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ApiError> {
        if self.config.api_key.is_empty() {
            return Err(ApiError::Auth("No API key configured".into()));
        }

        let url = format!("{}/chat/completions", self.base_url());
        let body = self.build_request(&request);
        debug!(model = %request.model, max_tokens = request.max_tokens, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let json: Value = response.json().await?;
            self.parse_response(json, &request.model)
        } else if status == StatusCode::UNAUTHORIZED {
            let error_text = response.text().await.unwrap_or_default();
            Err(ApiError::Auth(error_text))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after_secs(response.headers());
            warn!(retry_after_secs, "Completion endpoint rate limited");
            Err(ApiError::RateLimited { retry_after_secs })
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ApiError::Provider(format!("{}: {}", status, error_text)))
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use tokio_test::assert_err;

    fn client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig {
            api_key: "sk-test".into(),
            base_url: Some("http://localhost:9/v1/".into()),
            ..Default::default()
        })
        .expect("client builds")
    }

    #[test]
    fn test_build_request() {
        let request = CompletionRequest::new("gpt-4o-mini")
            .with_system("You are an MRP assistant")
            .with_user("Ile jest receptur?")
            .with_temperature(0.1)
            .with_max_tokens(250);

        let body = client().build_request(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Ile jest receptur?");
        assert_eq!(body["max_tokens"], 250);
        assert!((body["temperature"].as_f64().unwrap_or_default() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(client().base_url(), "http://localhost:9/v1");
    }

    #[test]
    fn test_parse_response() {
        let json = json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "message": {"role": "assistant", "content": "W systemie jest 40 receptur."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132}
        });

        let response = client().parse_response(json, "gpt-4o-mini").expect("parses");
        assert_eq!(response.content, "W systemie jest 40 receptur.");
        assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(132));
    }

    #[test]
    fn test_parse_response_without_usage() {
        let json = json!({"choices": [{"message": {"content": "ok"}}]});
        let response = client().parse_response(json, "gpt-4o").expect("parses");
        assert_eq!(response.model, "gpt-4o");
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_parse_response_without_content() {
        let json = json!({"choices": []});
        assert_err!(client().parse_response(json, "gpt-4o"));
    }

    #[test]
    fn test_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("17"));
        assert_eq!(retry_after_secs(&headers), 17);
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let client = OpenAiClient::new(OpenAiConfig::default()).expect("client builds");
        let result = client.complete(CompletionRequest::new("gpt-4o")).await;
        assert!(matches!(result, Err(ApiError::Auth(_))));
    }
}
