//! Chat-completion clients.

use crate::config::{LlmConfig, LlmProvider};
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use std::time::Duration;

/// LLM completion interface for recommendations.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the default HTTP-backed client.
pub fn create_llm_client(llm: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    Ok(Box::new(HttpLlmClient::new(llm)?))
}

/// Blocking client over OpenRouter, OpenAI or Anthropic.
///
/// OpenRouter and OpenAI share the chat-completions wire format.
pub struct HttpLlmClient {
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: String,
    temperature: f64,
    max_tokens: u32,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                std::env::var(config.provider.api_key_env())
                    .ok()
                    .filter(|k| !k.is_empty())
            })
            .ok_or_else(|| {
                Error::Config(format!(
                    "llm.api_key (or {}) is required",
                    config.provider.api_key_env()
                ))
            })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Llm(format!("failed to build tokio runtime: {e}")))?;
        let timeout_secs = config.timeout_secs.max(1);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            provider: config.provider,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            runtime,
            http,
        })
    }

    async fn chat_completions(&self, prompt: &str, label: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.endpoint);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| Error::Llm(format!("invalid auth header: {e}")))?,
        );

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
                "messages": [{ "role": "user", "content": prompt }]
            }))
            .send()
            .await
            .map_err(|e| Error::Llm(format!("{label} request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Llm(format!("{label} read body failed: {e}")))?;
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "{label} returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        let json: serde_json::Value = serde_json::from_str(&body)?;
        json.get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                Error::Llm(format!(
                    "{label} response missing choices[0].message.content"
                ))
            })
    }

    async fn claude_messages(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.endpoint);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Llm(format!("invalid claude api key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .map_err(|e| Error::Llm(format!("claude request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Llm(format!("claude read body failed: {e}")))?;
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "claude returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        let json: serde_json::Value = serde_json::from_str(&body)?;
        json.get("content")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("text"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| Error::Llm("claude response missing content[0].text".to_string()))
    }
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            provider = ?self.provider,
            model = %self.model,
            prompt_chars = prompt.len(),
            "Requesting completion"
        );
        self.runtime.block_on(async {
            match self.provider {
                LlmProvider::OpenRouter => self.chat_completions(prompt, "openrouter").await,
                LlmProvider::OpenAI => self.chat_completions(prompt, "openai").await,
                LlmProvider::Claude => self.claude_messages(prompt).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: LlmProvider, endpoint: String) -> LlmConfig {
        LlmConfig {
            provider,
            endpoint: Some(endpoint),
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_missing_api_key() {
        if std::env::var("OPENROUTER_API_KEY").is_ok() {
            return;
        }
        let err = HttpLlmClient::new(&LlmConfig::default()).err().unwrap();
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_openrouter_request_shape() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(header("authorization", "Bearer sk-test"))
                .and(body_partial_json(json!({
                    "model": "anthropic/claude-sonnet-4.5",
                    "max_tokens": 2000
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  [ ]  "}}]
                })))
                .mount(&server)
                .await;
            server
        });

        let client = HttpLlmClient::new(&config(LlmProvider::OpenRouter, server.uri())).unwrap();
        assert_eq!(client.complete("hello").unwrap(), "[ ]");
    }

    #[test]
    fn test_claude_request_shape() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/messages"))
                .and(header("x-api-key", "sk-test"))
                .and(header("anthropic-version", "2023-06-01"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "content": [{"type": "text", "text": "[]"}]
                })))
                .mount(&server)
                .await;
            server
        });

        let client = HttpLlmClient::new(&config(LlmProvider::Claude, server.uri())).unwrap();
        assert_eq!(client.complete("hello").unwrap(), "[]");
    }

    #[test]
    fn test_error_status_propagates() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
                .mount(&server)
                .await;
            server
        });

        let client = HttpLlmClient::new(&config(LlmProvider::OpenAI, server.uri())).unwrap();
        let err = client.complete("hello").unwrap_err();
        assert!(matches!(err, Error::Llm(msg) if msg.contains("429")));
    }
}
