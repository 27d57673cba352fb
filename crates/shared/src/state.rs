use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::StateResult;
use crate::models::{today, NewsItem};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news_articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        content TEXT,
        source TEXT NOT NULL,
        article_date TEXT,
        scraped_at TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0,
        summary TEXT,
        processed_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_source ON news_articles(source)",
    "CREATE INDEX IF NOT EXISTS idx_scraped_at ON news_articles(scraped_at)",
    "CREATE INDEX IF NOT EXISTS idx_processed ON news_articles(processed)",
];

const SELECT_COLUMNS: &str =
    "id, title, url, content, source, article_date, scraped_at, processed, summary, processed_at";

/// Counts reported by `stats()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateStats {
    pub total: usize,
    pub processed: usize,
    pub unprocessed: usize,
    pub last_24h: usize,
    pub by_source: Vec<(String, usize)>,
}

/// A row of the article table
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArticle {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub source: String,
    pub article_date: Option<NaiveDate>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub processed: bool,
    pub summary: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl StoredArticle {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let article_date: Option<String> = row.get(5)?;
        let scraped_at: String = row.get(6)?;
        let processed_at: Option<String> = row.get(9)?;
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            content: row.get(3)?,
            source: row.get(4)?,
            article_date: article_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            scraped_at: parse_timestamp(&scraped_at),
            processed: row.get::<_, i64>(7)? != 0,
            summary: row.get(8)?,
            processed_at: processed_at.as_deref().and_then(parse_timestamp),
        })
    }

    /// Turn a stored row back into a pipeline item
    pub fn into_news_item(self) -> NewsItem {
        NewsItem {
            title: self.title,
            url: self.url,
            published_date: self.article_date.unwrap_or_else(today),
            source_name: self.source,
            content: self.content.filter(|c| !c.is_empty()),
            summary: self.summary,
            processed_at: self.processed_at,
        }
    }
}

/// Persistent record of which items were discovered and which were delivered
pub struct StateTracker {
    conn: Connection,
}

impl StateTracker {
    pub fn open(path: &Path) -> StateResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StateResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StateResult<Self> {
        for migration in MIGRATIONS {
            conn.execute_batch(migration)?;
        }
        Ok(Self { conn })
    }

    /// True when the URL went out in a delivered digest
    pub fn has_seen(&self, url: &str) -> StateResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM news_articles WHERE url = ?1 AND processed = 1",
                params![url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Store newly discovered items. Known URLs are left untouched.
    pub fn record_discovered(&self, items: &[NewsItem]) -> StateResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let now = format_timestamp(Utc::now());
        let mut inserted = 0;
        for item in items {
            inserted += insert_item(&tx, item, &now)?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Mark items as delivered. Re-marking a delivered item changes nothing.
    ///
    /// Returns how many items were newly marked.
    pub fn mark_processed(&self, items: &[NewsItem]) -> StateResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let now = format_timestamp(Utc::now());
        let mut marked = 0;
        for item in items {
            insert_item(&tx, item, &now)?;
            marked += tx.execute(
                "UPDATE news_articles
                 SET processed = 1, processed_at = ?1, summary = COALESCE(?2, summary)
                 WHERE url = ?3 AND processed = 0",
                params![now, item.summary, item.url],
            )?;
        }
        tx.commit()?;
        Ok(marked)
    }

    /// Recorded items that were never delivered, newest first
    pub fn unprocessed(&self, limit: usize) -> StateResult<Vec<StoredArticle>> {
        let sql = format!(
            "SELECT {} FROM news_articles WHERE processed = 0
             ORDER BY scraped_at DESC, id DESC LIMIT ?1",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], StoredArticle::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Items recorded within the last `days` days, newest first
    pub fn recent(&self, days: i64, limit: usize) -> StateResult<Vec<StoredArticle>> {
        let cutoff = format_timestamp(Utc::now() - Duration::days(days));
        let sql = format!(
            "SELECT {} FROM news_articles WHERE scraped_at >= ?1
             ORDER BY scraped_at DESC, id DESC LIMIT ?2",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff, limit as i64], StoredArticle::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> StateResult<StateStats> {
        let count = |sql: &str, cutoff: Option<&str>| -> rusqlite::Result<usize> {
            let n: i64 = match cutoff {
                Some(c) => self.conn.query_row(sql, params![c], |row| row.get(0))?,
                None => self.conn.query_row(sql, [], |row| row.get(0))?,
            };
            Ok(n as usize)
        };

        let total = count("SELECT COUNT(*) FROM news_articles", None)?;
        let processed = count("SELECT COUNT(*) FROM news_articles WHERE processed = 1", None)?;
        let cutoff = format_timestamp(Utc::now() - Duration::days(1));
        let last_24h = count(
            "SELECT COUNT(*) FROM news_articles WHERE scraped_at >= ?1",
            Some(cutoff.as_str()),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT source, COUNT(*) AS n FROM news_articles
             GROUP BY source ORDER BY n DESC, source ASC",
        )?;
        let by_source = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StateStats {
            total,
            processed,
            unprocessed: total - processed,
            last_24h,
            by_source,
        })
    }

    /// Delete items recorded more than `days` days ago
    pub fn cleanup(&self, days: i64) -> StateResult<usize> {
        let cutoff = format_timestamp(Utc::now() - Duration::days(days));
        Ok(self.conn.execute(
            "DELETE FROM news_articles WHERE scraped_at < ?1",
            params![cutoff],
        )?)
    }

    /// Mark every item as undelivered again
    pub fn reset_processed(&self) -> StateResult<usize> {
        Ok(self.conn.execute(
            "UPDATE news_articles SET processed = 0, processed_at = NULL, summary = NULL",
            [],
        )?)
    }
}

fn insert_item(conn: &Connection, item: &NewsItem, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO news_articles
         (title, url, content, source, article_date, scraped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.title,
            item.url,
            item.content,
            item.source_name,
            item.published_date.format("%Y-%m-%d").to_string(),
            now,
        ],
    )
}

// Fixed-width UTC timestamps so string comparison in SQL orders correctly
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
