use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use shared::{Config, DigestArchive, StateTracker, StoredArticle};
use std::io::{self, BufRead, Write as _};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manage-db")]
#[command(about = "Inspect and maintain the sumo-digest state database")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show database statistics
    Stats,
    /// Show articles recorded recently
    Recent {
        /// Number of days to look back
        #[arg(short, long, default_value = "7", value_parser = days_in_range())]
        days: i64,
    },
    /// Show articles that were never delivered
    Unprocessed,
    /// Delete articles older than the given number of days
    Cleanup {
        #[arg(short, long, default_value = "30", value_parser = days_in_range())]
        days: i64,
    },
    /// Mark every article as undelivered again
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List archived digests, newest first
    Archives,
}

fn days_in_range() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(1..=36500)
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = Config::from_env()?;

    match args.command {
        Command::Stats => show_stats(&open_state(&config)?),
        Command::Recent { days } => show_recent(&open_state(&config)?, days),
        Command::Unprocessed => show_unprocessed(&open_state(&config)?),
        Command::Cleanup { days } => {
            let state = open_state(&config)?;
            println!("🧹 Cleaning up articles older than {} days...", days);
            let deleted = state.cleanup(days)?;
            println!("✓ Deleted {} old articles", deleted);
            Ok(())
        }
        Command::Reset { yes } => {
            let state = open_state(&config)?;
            if !yes && !confirm("Mark all articles as unprocessed?", io::stdin().lock())? {
                println!("Cancelled.");
                return Ok(());
            }
            let updated = state.reset_processed()?;
            println!("✓ Reset {} articles to unprocessed", updated);
            Ok(())
        }
        Command::Archives => show_archives(&DigestArchive::new(config.archives_dir.clone())),
    }
}

fn open_state(config: &Config) -> Result<StateTracker> {
    StateTracker::open(&config.db_path)
        .with_context(|| format!("Failed to open state database {}", config.db_path.display()))
}

fn show_stats(state: &StateTracker) -> Result<()> {
    let stats = state.stats()?;

    println!("📊 Database Statistics");
    println!("{}", "=".repeat(30));
    println!("Total articles: {}", stats.total);
    println!("Processed: {}", stats.processed);
    println!("Unprocessed: {}", stats.unprocessed);
    println!("Last 24 hours: {}", stats.last_24h);

    if !stats.by_source.is_empty() {
        println!("\nBy source:");
        for (source, count) in &stats.by_source {
            println!("  {}: {}", source, count);
        }
    }
    Ok(())
}

fn show_recent(state: &StateTracker, days: i64) -> Result<()> {
    let articles = state.recent(days, 20)?;

    println!("📰 Recent Articles (last {} days)", days);
    println!("{}", "=".repeat(50));
    for article in &articles {
        let status = if article.processed { "DONE" } else { "TODO" };
        print_article(status, article);
    }
    if articles.is_empty() {
        println!("No articles.");
    }
    Ok(())
}

fn show_unprocessed(state: &StateTracker) -> Result<()> {
    let articles = state.unprocessed(50)?;

    println!("📋 Unprocessed Articles ({})", articles.len());
    println!("{}", "=".repeat(40));
    for article in &articles {
        print_article("TODO", article);
    }
    Ok(())
}

fn show_archives(archive: &DigestArchive) -> Result<()> {
    let files = archive.list()?;

    if files.is_empty() {
        println!("No archived digests in {}", archive.dir().display());
        return Ok(());
    }

    println!("🗄  Archived Digests ({})", files.len());
    println!("{}", "=".repeat(50));
    for (path, record) in &files {
        println!("{}  {}", format_timestamp(Some(record.timestamp)), record.subject);
        println!(
            "   {} articles, to {}",
            record.article_count,
            record.recipient.as_deref().unwrap_or("unknown")
        );
        println!("   {}", path.display());
        println!();
    }
    Ok(())
}

fn print_article(status: &str, article: &StoredArticle) {
    let title: String = article.title.chars().take(60).collect();
    let ellipsis = if article.title.chars().count() > 60 { "..." } else { "" };
    println!("{} [{}] {}{}", status, article.source, title, ellipsis);
    println!("   {}", article.url);
    println!("   Scraped: {}", format_timestamp(article.scraped_at));
    println!();
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}

fn confirm(question: &str, mut input: impl BufRead) -> Result<bool> {
    print!("{} (y/N): ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
