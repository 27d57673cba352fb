use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// A text-in, text-out generative model
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, BackendError>;
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

pub struct ClaudeBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ClaudeBackend {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, ANTHROPIC_API_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl GenerativeBackend for ClaudeBackend {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, BackendError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            if status == StatusCode::TOO_MANY_REQUESTS || body.contains("rate_limit") {
                return Err(BackendError::RateLimited(body));
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let claude_response = response.json::<ClaudeResponse>().await?;

        let text = claude_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(BackendError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_returns_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"  Hoshoryu takes the Cup.  "}]}"#)
            .create_async()
            .await;

        let backend = ClaudeBackend::with_base_url("test-key".to_string(), server.url()).unwrap();
        let text = backend.complete("Summarize", 150).await.unwrap();

        assert_eq!(text, "Hoshoryu takes the Cup.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_body(r#"{"type":"error","error":{"type":"rate_limit_error"}}"#)
            .create_async()
            .await;

        let backend = ClaudeBackend::with_base_url("k".to_string(), server.url()).unwrap();
        let err = backend.complete("Summarize", 150).await.unwrap_err();
        assert!(matches!(err, BackendError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_complete_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(500)
            .with_body("overloaded")
            .create_async()
            .await;

        let backend = ClaudeBackend::with_base_url("k".to_string(), server.url()).unwrap();
        let err = backend.complete("Summarize", 150).await.unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_complete_empty_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content":[]}"#)
            .create_async()
            .await;

        let backend = ClaudeBackend::with_base_url("k".to_string(), server.url()).unwrap();
        let err = backend.complete("Summarize", 150).await.unwrap_err();
        assert!(matches!(err, BackendError::Empty));
    }
}
