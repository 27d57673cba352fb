use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;
use crate::extractor::article_body;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Retrieves the raw HTML of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}

/// Fetch an article page and extract its main text.
///
/// Failures are logged and yield `None`; a missing body never stops a run.
pub async fn fetch_article_body(fetcher: &dyn PageFetcher, url: &str) -> Option<String> {
    match fetcher.fetch(url).await {
        Ok(html) => article_body(&html),
        Err(e) => {
            tracing::warn!(url, error = %e, "could not fetch article body");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/En/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><a href=\"/n/1\">News</a></body></html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let html = fetcher.fetch(&format!("{}/En/", server.url())).await.unwrap();

        assert!(html.contains("/n/1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_fetch_article_body_extracts_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/article")
            .with_status(200)
            .with_body("<html><body><div class=\"entry-content\">Onosato earns promotion.</div></body></html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let body = fetch_article_body(&fetcher, &format!("{}/article", server.url())).await;
        assert_eq!(body.as_deref(), Some("Onosato earns promotion."));
    }

    #[tokio::test]
    async fn test_fetch_article_body_failure_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(
            fetch_article_body(&fetcher, &format!("{}/broken", server.url())).await,
            None
        );
    }
}
