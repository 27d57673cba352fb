use std::collections::HashSet;

use tracing::debug;

use crate::error::StateResult;
use crate::models::NewsItem;
use crate::state::StateTracker;

/// Key under which two titles count as the same story
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop candidates whose normalized title was already seen, first one wins.
///
/// `seen` carries titles across calls so a run can dedupe batches from
/// several sources against each other.
pub fn dedupe_titles(candidates: Vec<NewsItem>, seen: &mut HashSet<String>) -> Vec<NewsItem> {
    candidates
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(normalize_title(&item.title));
            if !fresh {
                debug!(title = %item.title, "dropped duplicate title");
            }
            fresh
        })
        .collect()
}

/// Drop candidates whose URL was delivered in an earlier digest.
///
/// Returns the remaining items and how many were dropped.
pub fn exclude_processed(
    candidates: Vec<NewsItem>,
    state: &StateTracker,
) -> StateResult<(Vec<NewsItem>, usize)> {
    let mut kept = Vec::with_capacity(candidates.len());
    let mut dropped = 0;
    for item in candidates {
        if state.has_seen(&item.url)? {
            debug!(url = %item.url, "already delivered");
            dropped += 1;
        } else {
            kept.push(item);
        }
    }
    Ok((kept, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::today;

    fn item(title: &str, url: &str) -> NewsItem {
        NewsItem::new(title, url, today(), "Test")
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  Hoshoryu   Wins\tAki Basho "),
            "hoshoryu wins aki basho"
        );
    }

    #[test]
    fn test_dedupe_first_seen_wins() {
        let mut seen = HashSet::new();
        let items = vec![
            item("Hoshoryu wins Aki basho", "https://a.jp/1"),
            item("HOSHORYU WINS AKI BASHO ", "https://b.jp/2"),
            item("Kotozakura promoted to ozeki", "https://a.jp/3"),
        ];
        let unique = dedupe_titles(items, &mut seen);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].url, "https://a.jp/1");
        assert_eq!(unique[1].url, "https://a.jp/3");
    }

    #[test]
    fn test_dedupe_across_batches() {
        let mut seen = HashSet::new();
        let first = dedupe_titles(vec![item("Hoshoryu wins Aki basho", "https://a.jp/1")], &mut seen);
        let second = dedupe_titles(vec![item("hoshoryu wins aki basho", "https://b.jp/1")], &mut seen);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_exclude_processed_uses_url() {
        let state = StateTracker::open_in_memory().unwrap();
        let mut delivered = item("Hoshoryu wins Aki basho", "https://a.jp/1");
        delivered.summary = Some("🥋 Hoshoryu wins Aki basho".to_string());
        state.mark_processed(&[delivered]).unwrap();

        let candidates = vec![
            item("Hoshoryu wins Aki basho again", "https://a.jp/1"),
            item("Hoshoryu wins Aki basho", "https://a.jp/2"),
        ];
        let (kept, dropped) = exclude_processed(candidates, &state).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://a.jp/2");
    }
}
