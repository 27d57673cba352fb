use anyhow::{Context, Result};
use clap::Parser;
use shared::{
    items_by_source, ClaudeBackend, Config, DeliveryGateway, DigestArchive, DigestPipeline,
    GenerativeBackend, HttpFetcher, PipelineSettings, ProbeReport, RunMode, RunOutcome,
    SmtpGateway, StateTracker,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sumo-digest")]
#[command(about = "Scrape sumo news, summarize it and email a digest")]
struct Args {
    /// Check state, email connectivity and sources without sending anything
    #[arg(short, long)]
    test: bool,

    /// Build and archive the digest but do not send it or mark anything processed
    #[arg(short, long, conflicts_with = "test")]
    dry_run: bool,

    /// Maximum number of items in one digest
    #[arg(short, long)]
    max_items: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    let state = StateTracker::open(&config.db_path)
        .with_context(|| format!("Failed to open state database {}", config.db_path.display()))?;

    let backend: Option<Arc<dyn GenerativeBackend>> = match &config.anthropic_api_key {
        Some(key) => Some(Arc::new(ClaudeBackend::new(key.clone())?)),
        None => {
            println!("⚠ ANTHROPIC_API_KEY not set, using title-based summaries");
            None
        }
    };

    let settings = PipelineSettings {
        max_items: args.max_items.unwrap_or(config.max_items),
        ..PipelineSettings::default()
    };

    let mut pipeline = DigestPipeline::new(
        config.sources.clone(),
        config.relevance_filter(),
        Arc::new(HttpFetcher::new()?),
        state,
    )
    .with_backend(backend)
    .with_settings(settings);

    // Delivery is only mandatory when we actually send
    let email = if args.test || args.dry_run {
        config.email.as_ref()
    } else {
        Some(config.require_email()?)
    };
    if let Some(email) = email {
        let gateway: Arc<dyn DeliveryGateway> =
            Arc::new(SmtpGateway::new(email).context("Failed to configure SMTP")?);
        pipeline = pipeline.with_gateway(gateway, email.to.clone());
    }

    if args.test {
        println!("🧪 Running system check...");
        let report = pipeline.probe().await?;
        print_probe(&report);
        return Ok(());
    }

    pipeline = pipeline.with_archive(DigestArchive::new(config.archives_dir.clone()));

    let mode = if args.dry_run {
        println!("🏃 Dry run: the digest will be built and archived but not sent");
        RunMode::DryRun
    } else {
        RunMode::Normal
    };

    println!("\n🥋 Collecting sumo news from {} sources...", config.sources.len());
    let report = pipeline.run(mode).await?;

    println!();
    for line in report.state.lines() {
        println!("  {}", line);
    }

    if let Some(digest) = report.outcome.digest() {
        println!("\n📰 \"{}\"", digest.subject);
        for (source, count) in items_by_source(digest) {
            println!("  {}: {} items", source, count);
        }
    }

    match &report.outcome {
        RunOutcome::NothingToSend => println!("\nNo news to send."),
        RunOutcome::Sent { .. } | RunOutcome::DryRun { .. } => {
            println!("\n✅ {}", report.outcome)
        }
        RunOutcome::SentUnmarked { .. } => {
            println!("\n⚠ {}", report.outcome);
            println!("  These items may be sent again on the next run.");
        }
        RunOutcome::DeliveryFailed { .. } => {
            anyhow::bail!("{}", report.outcome);
        }
    }

    Ok(())
}

fn print_probe(report: &ProbeReport) {
    println!("\n📊 Database:");
    println!("  Total articles: {}", report.stats.total);
    println!("  Processed: {}", report.stats.processed);
    println!("  Unprocessed: {}", report.stats.unprocessed);
    println!("  Last 24 hours: {}", report.stats.last_24h);

    println!("\n📧 Email:");
    match report.gateway_reachable {
        Some(true) => println!("  ✓ SMTP connection verified"),
        Some(false) => println!("  ✗ SMTP connection failed"),
        None => println!("  - Not configured"),
    }

    println!("\n🌐 Sources:");
    for source in &report.sources {
        match &source.error {
            None => println!(
                "  ✓ {}: {} candidates, {} relevant",
                source.name, source.candidates, source.relevant
            ),
            Some(e) => println!("  ✗ {}: {}", source.name, e),
        }
    }

    println!("\n🤖 Sample summary:");
    match &report.sample {
        Some((title, summary)) => {
            println!("  Title: {}", title);
            println!("  Summary: {}", summary);
        }
        None => println!("  No relevant items found"),
    }
}
