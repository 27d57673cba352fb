use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{Digest, NewsItem};

/// A digest as written to the archive directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedDigest {
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub intro: String,
    pub recipient: Option<String>,
    pub article_count: usize,
    pub articles: Vec<NewsItem>,
    pub html_content: String,
    pub text_content: String,
}

pub struct DigestArchive {
    dir: PathBuf,
}

impl DigestArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a digest as `email_YYYYMMDD_HHMMSS.json` plus an `.html` copy for
    /// viewing. Returns the JSON path.
    pub fn save(
        &self,
        digest: &Digest,
        recipient: Option<&str>,
        html: &str,
        text: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).context("Failed to create archive directory")?;

        let stamp = digest
            .created_at
            .with_timezone(&Local)
            .format("%Y%m%d_%H%M%S")
            .to_string();
        let json_path = self.dir.join(format!("email_{}.json", stamp));
        let html_path = self.dir.join(format!("email_{}.html", stamp));

        let record = ArchivedDigest {
            timestamp: digest.created_at,
            subject: digest.subject.clone(),
            intro: digest.intro.clone(),
            recipient: recipient.map(str::to_string),
            article_count: digest.items.len(),
            articles: digest.items.clone(),
            html_content: html.to_string(),
            text_content: text.to_string(),
        };

        let json = serde_json::to_string_pretty(&record).context("Failed to serialize digest")?;
        fs::write(&json_path, json)
            .with_context(|| format!("Failed to write archive {}", json_path.display()))?;
        fs::write(&html_path, html)
            .with_context(|| format!("Failed to write archive {}", html_path.display()))?;

        tracing::info!(path = %json_path.display(), "digest archived");
        Ok(json_path)
    }

    pub fn load(path: &Path) -> Result<ArchivedDigest> {
        if !path.exists() {
            anyhow::bail!("Archive not found: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read archive: {}", path.display()))?;

        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse archive {}. The file may be corrupted or not a digest archive.",
                path.display()
            )
        })
    }

    /// All readable archives, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<(PathBuf, ArchivedDigest)>> {
        let mut files = Vec::new();

        if !self.dir.exists() {
            return Ok(files);
        }

        for entry in fs::read_dir(&self.dir).context("Failed to read archive directory")? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match Self::load(&path) {
                    Ok(record) => files.push((path, record)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable archive");
                    }
                }
            }
        }

        files.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{today, DigestMeta};
    use chrono::TimeZone;

    fn digest_at(at: DateTime<Utc>) -> Digest {
        let mut digest = Digest::new(
            DigestMeta {
                subject: "Sumo Wrestling News Update".to_string(),
                intro: "Hello".to_string(),
            },
            vec![NewsItem::new("Hoshoryu wins Aki basho", "https://x.jp/1", today(), "Test")],
        );
        digest.created_at = at;
        digest
    }

    #[test]
    fn test_save_writes_json_and_html() {
        let dir = tempfile::tempdir().unwrap();
        let archive = DigestArchive::new(dir.path().join("archives"));
        let digest = digest_at(Utc::now());

        let path = archive
            .save(&digest, Some("fan@example.com"), "<p>hi</p>", "hi")
            .unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("email_") && name.ends_with(".json"));
        assert!(path.with_extension("html").exists());

        let loaded = DigestArchive::load(&path).unwrap();
        assert_eq!(loaded.article_count, 1);
        assert_eq!(loaded.recipient.as_deref(), Some("fan@example.com"));
        assert_eq!(loaded.html_content, "<p>hi</p>");
    }

    #[test]
    fn test_list_newest_first_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let archive = DigestArchive::new(dir.path());

        let older = digest_at(Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap());
        let newer = digest_at(Utc.with_ymd_and_hms(2024, 7, 28, 8, 0, 0).unwrap());
        archive.save(&older, None, "", "").unwrap();
        archive.save(&newer, None, "", "").unwrap();
        fs::write(dir.path().join("email_broken.json"), "{not json").unwrap();

        let listed = archive.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1.timestamp, newer.created_at);
        assert_eq!(listed[1].1.timestamp, older.created_at);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = DigestArchive::new(dir.path().join("nope"));
        assert!(archive.list().unwrap().is_empty());
    }
}
