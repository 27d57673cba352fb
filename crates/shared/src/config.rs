use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::models::SourceConfig;
use crate::relevance::RelevanceFilter;

const APP_DIR: &str = "sumo-digest";

/// SMTP settings for the delivery gateway
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: Option<String>,
    pub email: Option<EmailConfig>,
    pub db_path: PathBuf,
    pub archives_dir: PathBuf,
    pub sources: Vec<SourceConfig>,
    pub keywords: Vec<String>,
    pub exclusions: Vec<String>,
    pub max_items: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let anthropic_api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let email = Self::email_from_env()?;

        let db_path = match env::var("SUMO_DIGEST_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::data_dir()?.join("sumo_news.db"),
        };

        let archives_dir = match env::var("SUMO_DIGEST_ARCHIVES") {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::data_dir()?.join("archives"),
        };

        let sources = match env::var("SUMO_DIGEST_SOURCES") {
            Ok(path) => Self::load_sources(&PathBuf::from(path))?,
            Err(_) => SourceConfig::defaults(),
        };

        let keywords = env::var("SUMO_DIGEST_KEYWORDS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|_| RelevanceFilter::default_keywords());

        let exclusions = env::var("SUMO_DIGEST_EXCLUDE")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|_| RelevanceFilter::default_exclusions());

        let max_items = match env::var("SUMO_DIGEST_MAX_ITEMS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("SUMO_DIGEST_MAX_ITEMS must be a number, got {:?}", raw))?,
            Err(_) => 10,
        };

        Ok(Self {
            anthropic_api_key,
            email,
            db_path,
            archives_dir,
            sources,
            keywords,
            exclusions,
            max_items,
        })
    }

    /// Email settings are all-or-nothing. A partial set is a configuration mistake.
    fn email_from_env() -> Result<Option<EmailConfig>> {
        let vars = ["EMAIL_HOST", "EMAIL_USER", "EMAIL_PASS", "EMAIL_TO"];
        let present: Vec<&str> = vars
            .iter()
            .copied()
            .filter(|name| env::var(name).is_ok())
            .collect();

        if present.is_empty() {
            return Ok(None);
        }

        let get = |name: &str| {
            env::var(name).with_context(|| {
                format!(
                    "{} not found, but other EMAIL_* settings are set.\n\n\
                    To fix this, add to ~/.config/{}/.env:\n  \
                    EMAIL_HOST=smtp.gmail.com\n  \
                    EMAIL_PORT=587\n  \
                    EMAIL_USER=you@example.com\n  \
                    EMAIL_PASS=your_app_password\n  \
                    EMAIL_TO=recipient@example.com",
                    name, APP_DIR
                )
            })
        };

        let port = match env::var("EMAIL_PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("EMAIL_PORT must be a port number, got {:?}", raw))?,
            Err(_) => 587,
        };

        Ok(Some(EmailConfig {
            host: get("EMAIL_HOST")?,
            port,
            user: get("EMAIL_USER")?,
            pass: get("EMAIL_PASS")?,
            to: get("EMAIL_TO")?,
        }))
    }

    /// Email settings, required for runs that actually deliver
    pub fn require_email(&self) -> Result<&EmailConfig> {
        self.email.as_ref().context(
            "EMAIL_HOST, EMAIL_USER, EMAIL_PASS and EMAIL_TO are required to send the digest.\n\
            Set them in the environment or in ~/.config/sumo-digest/.env, \
            or use --dry-run to build the digest without sending it.",
        )
    }

    pub fn relevance_filter(&self) -> RelevanceFilter {
        RelevanceFilter::new(self.keywords.clone(), self.exclusions.clone())
    }

    fn load_sources(path: &PathBuf) -> Result<Vec<SourceConfig>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sources file: {}", path.display()))?;
        let sources: Vec<SourceConfig> = serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse sources file {}. Expected a JSON array of \
                {{\"name\", \"base_url\", \"listing_url\", \"parser\"}} objects.",
                path.display()
            )
        })?;
        if sources.is_empty() {
            anyhow::bail!("Sources file {} lists no sources", path.display());
        }
        Ok(sources)
    }

    fn data_dir() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .context("Could not determine local data directory")?
            .join(APP_DIR);
        fs::create_dir_all(&dir).context("Failed to create data directory")?;
        Ok(dir)
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/sumo-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_lowercases() {
        assert_eq!(
            split_list(" Tournament, BASHO ,,yokozuna "),
            vec!["tournament", "basho", "yokozuna"]
        );
    }

    #[test]
    fn test_load_sources_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        fs::write(
            &path,
            r#"[{"name":"Test","base_url":"https://t.jp","listing_url":"https://t.jp/news","parser":"content_areas"}]"#,
        )
        .unwrap();

        let sources = Config::load_sources(&path).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].parser, crate::models::ParserKind::ContentAreas);
    }

    #[test]
    fn test_load_sources_rejects_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        fs::write(&path, "[]").unwrap();
        assert!(Config::load_sources(&path).is_err());
    }
}
