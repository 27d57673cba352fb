use std::sync::Arc;

use crate::backend::GenerativeBackend;
use crate::models::{truncate_chars, DigestMeta, NewsItem};

pub const DEFAULT_SUBJECT: &str = "Sumo Wrestling News Update";
pub const DEFAULT_INTRO: &str = "Here are the latest updates from the world of sumo wrestling!";
pub const MAX_SUBJECT_CHARS: usize = 50;

const COMPOSE_MAX_TOKENS: u32 = 150;

/// Writes the subject line and intro paragraph for a digest
pub struct DigestComposer {
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl DigestComposer {
    pub fn new(backend: Option<Arc<dyn GenerativeBackend>>) -> Self {
        Self { backend }
    }

    pub fn default_meta() -> DigestMeta {
        DigestMeta {
            subject: DEFAULT_SUBJECT.to_string(),
            intro: DEFAULT_INTRO.to_string(),
        }
    }

    /// Subject and intro for `items`. Falls back to the static pair when the
    /// backend is missing, fails or answers without either label.
    pub async fn compose(&self, items: &[NewsItem]) -> DigestMeta {
        let Some(backend) = &self.backend else {
            return Self::default_meta();
        };

        match backend.complete(&Self::prompt(items), COMPOSE_MAX_TOKENS).await {
            Ok(response) => match parse_labeled_response(&response) {
                Some(meta) => meta,
                None => {
                    tracing::warn!("composer response had no SUBJECT or INTRO, using defaults");
                    Self::default_meta()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "composing digest failed, using defaults");
                Self::default_meta()
            }
        }
    }

    fn prompt(items: &[NewsItem]) -> String {
        let news_content = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                format!("{}. {}\n   📰 Read more: {}", idx + 1, item.display_text(), item.url)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Create an engaging email subject line and introduction for a sumo wrestling news digest. The email contains {} news items. Make it enthusiastic and appealing to sumo fans.

News items:
{}

Format your response as:
SUBJECT: compelling subject line under 50 characters
INTRO: 2-3 sentence introduction paragraph"#,
            items.len(),
            news_content
        )
    }
}

/// Pull `SUBJECT:` and `INTRO:` lines out of a free-form response.
///
/// Numbering ("1.") and markdown emphasis around the labels are ignored. A
/// missing label takes its default; `None` when neither label is present.
pub fn parse_labeled_response(text: &str) -> Option<DigestMeta> {
    let mut subject = None;
    let mut intro = None;

    for line in text.lines() {
        let cleaned = strip_decoration(line);
        if let Some(value) = label_value(cleaned, "SUBJECT") {
            if subject.is_none() && !value.is_empty() {
                subject = Some(value);
            }
        } else if let Some(value) = label_value(cleaned, "INTRO") {
            if intro.is_none() && !value.is_empty() {
                intro = Some(value);
            }
        }
    }

    if subject.is_none() && intro.is_none() {
        return None;
    }

    Some(DigestMeta {
        subject: truncate_chars(
            subject.as_deref().unwrap_or(DEFAULT_SUBJECT),
            MAX_SUBJECT_CHARS,
        ),
        intro: intro.unwrap_or_else(|| DEFAULT_INTRO.to_string()),
    })
}

fn strip_decoration(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', ')'])
        .trim_start_matches(['#', '-', '*', '_', ' '])
}

fn label_value(line: &str, label: &str) -> Option<String> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start_matches(['*', '_']);
    let value = rest.strip_prefix(':')?;
    let value = value
        .trim()
        .trim_matches(['*', '_'])
        .trim()
        .trim_matches('"')
        .trim();
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use async_trait::async_trait;

    struct FixedBackend(Result<String, ()>);

    #[async_trait]
    impl GenerativeBackend for FixedBackend {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, BackendError> {
            self.0.clone().map_err(|_| BackendError::Empty)
        }
    }

    fn items() -> Vec<NewsItem> {
        vec![NewsItem::new(
            "Hoshoryu wins Aki basho",
            "https://x.jp/1",
            crate::models::today(),
            "Test",
        )]
    }

    #[test]
    fn test_parse_plain_labels() {
        let meta = parse_labeled_response(
            "SUBJECT: Hoshoryu Lifts the Cup!\nINTRO: What a basho it was.",
        )
        .unwrap();
        assert_eq!(meta.subject, "Hoshoryu Lifts the Cup!");
        assert_eq!(meta.intro, "What a basho it was.");
    }

    #[test]
    fn test_parse_numbered_and_markdown_labels() {
        let meta = parse_labeled_response(
            "Sure! Here you go:\n\n1. **SUBJECT:** Aki Basho Wrap-Up\n2. **INTRO:** Two weeks of drama.",
        )
        .unwrap();
        assert_eq!(meta.subject, "Aki Basho Wrap-Up");
        assert_eq!(meta.intro, "Two weeks of drama.");
    }

    #[test]
    fn test_parse_single_label_uses_default_for_other() {
        let meta = parse_labeled_response("SUBJECT: Banzuke Day").unwrap();
        assert_eq!(meta.subject, "Banzuke Day");
        assert_eq!(meta.intro, DEFAULT_INTRO);

        let meta = parse_labeled_response("intro: Fresh news from the dohyo.").unwrap();
        assert_eq!(meta.subject, DEFAULT_SUBJECT);
        assert_eq!(meta.intro, "Fresh news from the dohyo.");
    }

    #[test]
    fn test_parse_no_labels() {
        assert!(parse_labeled_response("Here is a great digest for you").is_none());
    }

    #[test]
    fn test_subject_clamped() {
        let long = "S".repeat(80);
        let meta = parse_labeled_response(&format!("SUBJECT: {}\nINTRO: hi", long)).unwrap();
        assert_eq!(meta.subject.chars().count(), MAX_SUBJECT_CHARS);
    }

    #[tokio::test]
    async fn test_compose_without_backend_uses_defaults() {
        let meta = DigestComposer::new(None).compose(&items()).await;
        assert_eq!(meta, DigestComposer::default_meta());
    }

    #[tokio::test]
    async fn test_compose_backend_failure_uses_defaults() {
        let composer = DigestComposer::new(Some(Arc::new(FixedBackend(Err(())))));
        assert_eq!(composer.compose(&items()).await, DigestComposer::default_meta());
    }

    #[tokio::test]
    async fn test_compose_unlabelled_response_uses_defaults() {
        let composer = DigestComposer::new(Some(Arc::new(FixedBackend(Ok("Great news!".into())))));
        assert_eq!(composer.compose(&items()).await, DigestComposer::default_meta());
    }

    #[tokio::test]
    async fn test_compose_uses_backend_labels() {
        let composer = DigestComposer::new(Some(Arc::new(FixedBackend(Ok(
            "SUBJECT: Cup Goes to Hoshoryu\nINTRO: The yokozuna delivers.".into(),
        )))));
        let meta = composer.compose(&items()).await;
        assert_eq!(meta.subject, "Cup Goes to Hoshoryu");
        assert_eq!(meta.intro, "The yokozuna delivers.");
    }
}
