use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a per-item summary, in characters.
pub const MAX_SUMMARY_CHARS: usize = 280;

/// Maximum length of fetched article body text, in characters.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// One discovered piece of news
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub published_date: NaiveDate,
    pub source_name: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        published_date: NaiveDate,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published_date,
            source_name: source_name.into(),
            content: None,
            summary: None,
            processed_at: None,
        }
    }

    /// Text shown for the item in a digest: the summary when present, else the title.
    pub fn display_text(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.title)
    }
}

/// Subject line and intro paragraph for a digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestMeta {
    pub subject: String,
    pub intro: String,
}

/// One outbound batch of summarized items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub subject: String,
    pub intro: String,
    pub items: Vec<NewsItem>,
    pub created_at: DateTime<Utc>,
}

impl Digest {
    pub fn new(meta: DigestMeta, items: Vec<NewsItem>) -> Self {
        Self {
            subject: meta.subject,
            intro: meta.intro,
            items,
            created_at: Utc::now(),
        }
    }
}

/// Which extra extraction strategies a source needs on top of the default two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    #[default]
    Generic,
    ArticleCards,
    ContentAreas,
}

/// A web source to scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    pub listing_url: String,
    #[serde(default)]
    pub parser: ParserKind,
}

impl SourceConfig {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        listing_url: impl Into<String>,
        parser: ParserKind,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            listing_url: listing_url.into(),
            parser,
        }
    }

    /// The sources the digest has always been built from
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "Japan Sumo Association",
                "https://www.sumo.or.jp",
                "https://www.sumo.or.jp/En/",
                ParserKind::Generic,
            ),
            Self::new(
                "Japan Times Sumo",
                "https://www.japantimes.co.jp",
                "https://www.japantimes.co.jp/sports/sumo/",
                ParserKind::ArticleCards,
            ),
            Self::new(
                "IFS Sumo",
                "http://www.ifs-sumo.org",
                "http://www.ifs-sumo.org/",
                ParserKind::ContentAreas,
            ),
        ]
    }
}

/// Today's date in local time, used when no date can be inferred
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Truncate to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_short_text_unchanged() {
        assert_eq!(truncate_chars("Yokozuna", 280), "Yokozuna");
    }

    #[test]
    fn test_truncate_chars_marks_cut() {
        let long = "a".repeat(300);
        let out = truncate_chars(&long, 280);
        assert_eq!(out.chars().count(), 280);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_chars_counts_characters_not_bytes() {
        let text = "横綱".repeat(200);
        let out = truncate_chars(&text, 280);
        assert_eq!(out.chars().count(), 280);
    }

    #[test]
    fn test_display_text_prefers_summary() {
        let mut item = NewsItem::new(
            "Hoshoryu wins basho",
            "https://example.com/a",
            today(),
            "Test",
        );
        assert_eq!(item.display_text(), "Hoshoryu wins basho");
        item.summary = Some("🥋 Hoshoryu wins basho".to_string());
        assert_eq!(item.display_text(), "🥋 Hoshoryu wins basho");
    }

    #[test]
    fn test_source_config_parser_defaults_to_generic() {
        let json = r#"{"name":"X","base_url":"https://x.jp","listing_url":"https://x.jp/news"}"#;
        let source: SourceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(source.parser, ParserKind::Generic);
    }

    #[test]
    fn test_default_sources() {
        let sources = SourceConfig::defaults();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[1].parser, ParserKind::ArticleCards);
    }
}
