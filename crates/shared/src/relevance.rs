use tracing::debug;

use crate::models::NewsItem;

pub const MIN_TITLE_CHARS: usize = 15;
pub const MAX_TITLE_CHARS: usize = 150;

/// Keyword heuristic deciding whether a candidate is worth a summary.
///
/// A candidate is relevant when some vocabulary term appears in its title or
/// URL, no exclusion term appears in its title, and the title length is within
/// [`MIN_TITLE_CHARS`, `MAX_TITLE_CHARS`].
///
/// Vocabulary terms match as substrings so "promot" style stems work and URL
/// paths such as `/sumo/` count. Exclusion terms match whole words only, so
/// "home" rejects a "Home" link but not "Homegrown ozeki".
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
    exclusions: Vec<Vec<String>>,
}

impl RelevanceFilter {
    pub fn new(keywords: Vec<String>, exclusions: Vec<String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let exclusions = exclusions
            .iter()
            .map(|e| words(e))
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            keywords,
            exclusions,
        }
    }

    pub fn default_keywords() -> Vec<String> {
        [
            "tournament",
            "champion",
            "promotion",
            "promoted",
            "sumo",
            "wrestler",
            "bout",
            "winner",
            "result",
            "ranking",
            "banzuke",
            "ceremony",
            "basho",
            "yokozuna",
            "ozeki",
            "sekiwake",
            "komusubi",
            "maegashira",
            "juryo",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn default_exclusions() -> Vec<String> {
        [
            "home",
            "contact",
            "about",
            "privacy",
            "terms",
            "site map",
            "sitemap",
            "english",
            "japanese",
            "menu",
            "login",
            "subscribe",
            "newsletter",
            "advertisement",
            "cookie",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn is_relevant(&self, title: &str, url: &str) -> bool {
        let title = title.trim();
        let len = title.chars().count();
        if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&len) {
            return false;
        }

        let title_words = words(title);
        if self
            .exclusions
            .iter()
            .any(|term| contains_sequence(&title_words, term))
        {
            return false;
        }

        let title_lower = title.to_lowercase();
        let url_lower = url.to_lowercase();
        self.keywords
            .iter()
            .any(|k| title_lower.contains(k.as_str()) || url_lower.contains(k.as_str()))
    }

    /// Keep the relevant candidates, preserving order
    pub fn filter(&self, candidates: Vec<NewsItem>) -> Vec<NewsItem> {
        candidates
            .into_iter()
            .filter(|item| {
                let keep = self.is_relevant(&item.title, &item.url);
                if !keep {
                    debug!(title = %item.title, "rejected as irrelevant");
                }
                keep
            })
            .collect()
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(Self::default_keywords(), Self::default_exclusions())
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
