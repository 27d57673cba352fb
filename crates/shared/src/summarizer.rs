use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::GenerativeBackend;
use crate::error::BackendError;
use crate::models::{truncate_chars, NewsItem, MAX_SUMMARY_CHARS};

const BADGE: &str = "🥋";
const SUMMARY_MAX_TOKENS: u32 = 100;

/// Produces the short text shown for an item in a digest
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, item: &NewsItem) -> Result<String, BackendError>;
}

/// Tweet-like summaries written by a generative backend
pub struct GenerativeSummarizer {
    backend: Arc<dyn GenerativeBackend>,
}

impl GenerativeSummarizer {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    fn prompt(item: &NewsItem) -> String {
        format!(
            r#"Convert this sumo wrestling news into a concise, engaging tweet-like summary (max 280 characters). Make it informative but casual and exciting.

Title: {}
URL: {}
Additional context: {}

RULES:
1. Respond with the summary only, no preamble
2. Use only facts from the title and context
3. Sumo terminology and emojis are welcome"#,
            item.title,
            item.url,
            item.content.as_deref().unwrap_or("")
        )
    }
}

#[async_trait]
impl Summarizer for GenerativeSummarizer {
    async fn summarize(&self, item: &NewsItem) -> Result<String, BackendError> {
        let text = self
            .backend
            .complete(&Self::prompt(item), SUMMARY_MAX_TOKENS)
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::Empty);
        }
        Ok(truncate_chars(text, MAX_SUMMARY_CHARS))
    }
}

/// Badge plus title. Needs no network.
pub struct DeterministicSummarizer;

impl DeterministicSummarizer {
    pub fn summary_for(item: &NewsItem) -> String {
        let prefix = format!("{} ", BADGE);
        let room = MAX_SUMMARY_CHARS - prefix.chars().count();
        format!("{}{}", prefix, truncate_chars(item.title.trim(), room))
    }
}

#[async_trait]
impl Summarizer for DeterministicSummarizer {
    async fn summarize(&self, item: &NewsItem) -> Result<String, BackendError> {
        Ok(Self::summary_for(item))
    }
}

/// Tries the primary summarizer and falls back to the badge-plus-title form
/// when it is missing, fails or returns nothing.
pub struct FallbackSummarizer {
    primary: Option<Box<dyn Summarizer>>,
}

impl FallbackSummarizer {
    pub fn new(primary: Option<Box<dyn Summarizer>>) -> Self {
        Self { primary }
    }

    /// Build from an optional backend
    pub fn from_backend(backend: Option<Arc<dyn GenerativeBackend>>) -> Self {
        Self::new(backend.map(|b| Box::new(GenerativeSummarizer::new(b)) as Box<dyn Summarizer>))
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Summarize `item`, reporting whether the fallback was used
    pub async fn summarize_reporting(&self, item: &NewsItem) -> (String, bool) {
        if let Some(primary) = &self.primary {
            match primary.summarize(item).await {
                Ok(text) if !text.trim().is_empty() => {
                    return (truncate_chars(text.trim(), MAX_SUMMARY_CHARS), false);
                }
                Ok(_) => tracing::warn!(title = %item.title, "empty summary, using fallback"),
                Err(e) => tracing::warn!(title = %item.title, error = %e, "summary failed, using fallback"),
            }
        }
        (DeterministicSummarizer::summary_for(item), true)
    }
}

#[async_trait]
impl Summarizer for FallbackSummarizer {
    async fn summarize(&self, item: &NewsItem) -> Result<String, BackendError> {
        Ok(self.summarize_reporting(item).await.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::today;

    struct FixedBackend(String);

    #[async_trait]
    impl GenerativeBackend for FixedBackend {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, BackendError> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl GenerativeBackend for FailingBackend {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, BackendError> {
            Err(BackendError::RateLimited("slow down".to_string()))
        }
    }

    fn item(title: &str) -> NewsItem {
        NewsItem::new(title, "https://www.sumo.or.jp/En/news/1", today(), "Test")
    }

    #[tokio::test]
    async fn test_deterministic_summary() {
        let summary = DeterministicSummarizer
            .summarize(&item("Terunofuji wins July tournament 13-2"))
            .await
            .unwrap();
        assert_eq!(summary, "🥋 Terunofuji wins July tournament 13-2");
    }

    #[tokio::test]
    async fn test_deterministic_summary_bounded() {
        let summary = DeterministicSummarizer::summary_for(&item(&"yokozuna ".repeat(60)));
        assert!(summary.chars().count() <= MAX_SUMMARY_CHARS);
        assert!(summary.starts_with("🥋 yokozuna"));
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn test_generative_summary_truncated() {
        let backend = Arc::new(FixedBackend("🎉 ".repeat(400)));
        let summary = GenerativeSummarizer::new(backend)
            .summarize(&item("Hoshoryu wins Aki basho"))
            .await
            .unwrap();
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS);
        assert!(summary.ends_with("..."));
    }

    #[tokio::test]
    async fn test_prompt_includes_item_fields() {
        let mut news = item("Kotozakura promoted to ozeki");
        news.content = Some("The Japan Sumo Association confirmed".to_string());
        let prompt = GenerativeSummarizer::prompt(&news);
        assert!(prompt.contains("Title: Kotozakura promoted to ozeki"));
        assert!(prompt.contains("URL: https://www.sumo.or.jp/En/news/1"));
        assert!(prompt.contains("The Japan Sumo Association confirmed"));
    }

    #[tokio::test]
    async fn test_fallback_used_on_error() {
        let summarizer = FallbackSummarizer::from_backend(Some(Arc::new(FailingBackend)));
        let (summary, fell_back) = summarizer
            .summarize_reporting(&item("Onosato promoted to sekiwake after 11-4 record"))
            .await;
        assert!(fell_back);
        assert_eq!(summary, "🥋 Onosato promoted to sekiwake after 11-4 record");
    }

    #[tokio::test]
    async fn test_fallback_used_on_empty_output() {
        let summarizer = FallbackSummarizer::from_backend(Some(Arc::new(FixedBackend("   ".into()))));
        let (summary, fell_back) = summarizer.summarize_reporting(&item("Hoshoryu wins Aki basho")).await;
        assert!(fell_back);
        assert_eq!(summary, "🥋 Hoshoryu wins Aki basho");
    }

    #[tokio::test]
    async fn test_fallback_without_backend() {
        let summarizer = FallbackSummarizer::from_backend(None);
        assert!(!summarizer.has_primary());
        let summary = summarizer.summarize(&item("Hoshoryu wins Aki basho")).await.unwrap();
        assert_eq!(summary, "🥋 Hoshoryu wins Aki basho");
    }

    #[tokio::test]
    async fn test_primary_used_when_healthy() {
        let backend = Arc::new(FixedBackend("Hoshoryu storms to the Emperor's Cup! 🏆".into()));
        let summarizer = FallbackSummarizer::from_backend(Some(backend));
        let (summary, fell_back) = summarizer.summarize_reporting(&item("Hoshoryu wins Aki basho")).await;
        assert!(!fell_back);
        assert_eq!(summary, "Hoshoryu storms to the Emperor's Cup! 🏆");
    }
}
