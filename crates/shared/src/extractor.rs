use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::models::{NewsItem, ParserKind, SourceConfig, MAX_CONTENT_CHARS};

static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("LINK selector should parse"));
static SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section").expect("SECTION selector should parse"));
static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, div").expect("CARD selector should parse"));
static AREA: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div, section, article").expect("AREA selector should parse")
});
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4").expect("HEADING selector should parse"));
static DATE_ELEMENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time, span").expect("DATE_ELEMENT selector should parse"));
static BODY_BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("article, div, section, p").expect("BODY_BLOCK selector should parse")
});
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("PARAGRAPH selector should parse"));

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})|(\d{1,2})[-/](\d{1,2})[-/](\d{4})")
        .expect("DATE_RE should compile")
});

/// One way of pulling candidate items out of a listing page.
///
/// Strategies are independent: each sees the whole document and may return
/// overlapping candidates. Deduplication happens downstream.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, document: &Html, source: &SourceConfig, fetched_on: NaiveDate)
        -> Vec<NewsItem>;
}

/// Every hyperlink on the page is a candidate
pub struct LinkScan;

impl Extractor for LinkScan {
    fn name(&self) -> &'static str {
        "link-scan"
    }

    fn extract(&self, document: &Html, source: &SourceConfig, fetched_on: NaiveDate) -> Vec<NewsItem> {
        document
            .select(&LINK)
            .filter_map(|link| {
                let title = element_text(link);
                candidate(title, link, source, fetched_on)
            })
            .collect()
    }
}

/// Blocks whose class says "news" or "what-new", one candidate per block
pub struct NewsSections;

impl Extractor for NewsSections {
    fn name(&self) -> &'static str {
        "news-sections"
    }

    fn extract(&self, document: &Html, source: &SourceConfig, fetched_on: NaiveDate) -> Vec<NewsItem> {
        document
            .select(&SECTION)
            .filter(|block| class_matches(*block, &["news", "what-new"]))
            .filter_map(|block| {
                let link = block.select(&LINK).next()?;
                let mut title = element_text(link);
                if title.is_empty() {
                    title = element_text(block);
                }
                candidate(title, link, source, fetched_on)
            })
            .collect()
    }
}

/// Article cards with a heading, a link and sometimes a date element
pub struct ArticleCards;

impl Extractor for ArticleCards {
    fn name(&self) -> &'static str {
        "article-cards"
    }

    fn extract(&self, document: &Html, source: &SourceConfig, fetched_on: NaiveDate) -> Vec<NewsItem> {
        document
            .select(&CARD)
            .filter(|card| class_matches(*card, &["article", "post", "story", "headline"]))
            .filter_map(|card| {
                let heading = card
                    .select(&HEADING)
                    .find(|h| class_matches(*h, &["title", "headline", "head"]))
                    .or_else(|| card.select(&HEADING).next())?;
                let link = heading
                    .select(&LINK)
                    .next()
                    .or_else(|| card.select(&LINK).next())?;

                let title = element_text(heading);
                let date = card
                    .select(&DATE_ELEMENT)
                    .filter(|el| class_matches(*el, &["date", "time"]))
                    .find_map(element_date)
                    .unwrap_or(fetched_on);

                candidate(title, link, source, date)
            })
            .collect()
    }
}

/// Every link inside the main content containers
pub struct ContentAreas;

impl Extractor for ContentAreas {
    fn name(&self) -> &'static str {
        "content-areas"
    }

    fn extract(&self, document: &Html, source: &SourceConfig, fetched_on: NaiveDate) -> Vec<NewsItem> {
        document
            .select(&AREA)
            .filter(|area| class_matches(*area, &["content", "news", "main", "post"]))
            .flat_map(|area| area.select(&LINK))
            .filter_map(|link| candidate(element_text(link), link, source, fetched_on))
            .collect()
    }
}

/// The strategies to run for a source, in merge order
pub fn strategies_for(parser: ParserKind) -> Vec<Box<dyn Extractor>> {
    let mut strategies: Vec<Box<dyn Extractor>> = vec![Box::new(LinkScan), Box::new(NewsSections)];
    match parser {
        ParserKind::Generic => {}
        ParserKind::ArticleCards => strategies.push(Box::new(ArticleCards)),
        ParserKind::ContentAreas => strategies.push(Box::new(ContentAreas)),
    }
    strategies
}

/// Run every strategy for `source` over `html` and concatenate the results
pub fn extract_candidates(html: &str, source: &SourceConfig, fetched_on: NaiveDate) -> Vec<NewsItem> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();
    for strategy in strategies_for(source.parser) {
        let found = strategy.extract(&document, source, fetched_on);
        tracing::debug!(
            source = %source.name,
            strategy = strategy.name(),
            count = found.len(),
            "extracted candidates"
        );
        candidates.extend(found);
    }
    candidates
}

/// Main text of an article page, bounded to `MAX_CONTENT_CHARS`.
///
/// Prefers blocks whose class mentions content or main, then paragraphs,
/// then a plain-text rendering of the whole page.
pub fn article_body(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let mut parts: Vec<String> = document
        .select(&BODY_BLOCK)
        .filter(|el| class_matches(*el, &["content", "main"]))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    if parts.is_empty() {
        parts = document
            .select(&PARAGRAPH)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
    }

    let text = if parts.is_empty() {
        collapse_whitespace(&html2text::from_read(html.as_bytes(), 100))
    } else {
        parts.join(" ")
    };

    let bounded: String = text.chars().take(MAX_CONTENT_CHARS).collect();
    let bounded = bounded.trim().to_string();
    if bounded.is_empty() {
        None
    } else {
        Some(bounded)
    }
}

/// Find a `YYYY-MM-DD` or `MM-DD-YYYY` style date in free text
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    if let (Some(y), Some(m), Some(d)) = (num(1), num(2), num(3)) {
        return NaiveDate::from_ymd_opt(y as i32, m, d);
    }

    let (a, b, y) = (num(4)?, num(5)?, num(6)? as i32);
    // month-first as written on the English sites, day-first when that can't be a month
    NaiveDate::from_ymd_opt(y, a, b).or_else(|| NaiveDate::from_ymd_opt(y, b, a))
}

/// Resolve a link against the source's base URL.
///
/// Script, mail and fragment-only links are not articles and yield `None`.
pub fn resolve_url(href: &str, base_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_lowercase();
    if ["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    if let Ok(absolute) = Url::parse(href) {
        return matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string());
    }

    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/'))).ok()?;
    let relative = if href.starts_with('/') {
        href.to_string()
    } else {
        format!("/{}", href.trim_start_matches("./"))
    };
    base.join(&relative).ok().map(|u| u.to_string())
}

fn candidate(
    title: String,
    link: ElementRef<'_>,
    source: &SourceConfig,
    fallback_date: NaiveDate,
) -> Option<NewsItem> {
    if title.is_empty() {
        return None;
    }
    let url = resolve_url(link.value().attr("href")?, &source.base_url)?;
    let date = extract_date(&title).unwrap_or(fallback_date);
    Some(NewsItem::new(title, url, date, source.name.clone()))
}

fn element_date(el: ElementRef<'_>) -> Option<NaiveDate> {
    el.value()
        .attr("datetime")
        .and_then(extract_date)
        .or_else(|| extract_date(&element_text(el)))
}

fn class_matches(el: ElementRef<'_>, needles: &[&str]) -> bool {
    el.value().classes().any(|class| {
        let class = class.to_lowercase();
        needles.iter().any(|needle| class.contains(needle))
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
