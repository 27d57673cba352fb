use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::archive::DigestArchive;
use crate::backend::GenerativeBackend;
use crate::composer::DigestComposer;
use crate::dedup::{dedupe_titles, exclude_processed};
use crate::delivery::{DeliveryGateway, DeliveryReceipt};
use crate::error::{DeliveryError, StateError, StateResult};
use crate::extractor::extract_candidates;
use crate::fetcher::{fetch_article_body, PageFetcher};
use crate::models::{today, Digest, NewsItem, SourceConfig};
use crate::relevance::RelevanceFilter;
use crate::render::DigestRenderer;
use crate::state::{StateStats, StateTracker};
use crate::summarizer::FallbackSummarizer;
use crate::throttle::Throttle;

/// Run-level knobs
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_items: usize,
    pub article_delay: Duration,
    pub backend_delay: Duration,
    pub source_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_items: 10,
            article_delay: Duration::from_secs(1),
            backend_delay: Duration::from_secs(1),
            source_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Deliver the digest and mark its items processed
    Normal,
    /// Build and archive the digest, but neither deliver nor touch state
    DryRun,
}

/// Counters collected while a run progresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub sources_attempted: usize,
    pub sources_failed: usize,
    pub candidates: usize,
    pub relevant: usize,
    pub unique: usize,
    pub already_processed: usize,
    pub backlog: usize,
    pub selected: usize,
    pub bodies_fetched: usize,
    pub fallback_summaries: usize,
}

#[derive(Debug)]
pub enum RunOutcome {
    NothingToSend,
    Sent {
        receipt: DeliveryReceipt,
        digest: Digest,
    },
    /// Delivered, but recording the items as processed failed. The next run
    /// may offer them again.
    SentUnmarked {
        receipt: DeliveryReceipt,
        digest: Digest,
        error: StateError,
    },
    DryRun {
        digest: Digest,
    },
    DeliveryFailed {
        error: DeliveryError,
        digest: Digest,
    },
}

impl RunOutcome {
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            RunOutcome::NothingToSend => None,
            RunOutcome::Sent { digest, .. }
            | RunOutcome::SentUnmarked { digest, .. }
            | RunOutcome::DryRun { digest }
            | RunOutcome::DeliveryFailed { digest, .. } => Some(digest),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::DeliveryFailed { .. })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::NothingToSend => write!(f, "No news to send"),
            RunOutcome::Sent { receipt, digest } => write!(
                f,
                "Sent \"{}\" with {} items (receipt {})",
                digest.subject,
                digest.items.len(),
                receipt.id
            ),
            RunOutcome::SentUnmarked {
                receipt,
                digest,
                error,
            } => write!(
                f,
                "Sent \"{}\" with {} items (receipt {}), but could not mark them processed: {}",
                digest.subject,
                digest.items.len(),
                receipt.id,
                error
            ),
            RunOutcome::DryRun { digest } => write!(
                f,
                "Dry run: built \"{}\" with {} items, nothing sent",
                digest.subject,
                digest.items.len()
            ),
            RunOutcome::DeliveryFailed { error, digest } => write!(
                f,
                "Delivery of \"{}\" failed: {}",
                digest.subject, error
            ),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub outcome: RunOutcome,
}

/// Scrape result for one source in a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProbe {
    pub name: String,
    pub candidates: usize,
    pub relevant: usize,
    pub error: Option<String>,
}

/// Health check that touches every collaborator once without side effects
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub stats: StateStats,
    pub gateway_reachable: Option<bool>,
    pub sources: Vec<SourceProbe>,
    pub sample: Option<(String, String)>,
}

pub struct DigestPipeline {
    sources: Vec<SourceConfig>,
    filter: RelevanceFilter,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: FallbackSummarizer,
    composer: DigestComposer,
    gateway: Option<Arc<dyn DeliveryGateway>>,
    recipient: Option<String>,
    archive: Option<DigestArchive>,
    state: StateTracker,
    settings: PipelineSettings,
}

impl DigestPipeline {
    pub fn new(
        sources: Vec<SourceConfig>,
        filter: RelevanceFilter,
        fetcher: Arc<dyn PageFetcher>,
        state: StateTracker,
    ) -> Self {
        Self {
            sources,
            filter,
            fetcher,
            summarizer: FallbackSummarizer::from_backend(None),
            composer: DigestComposer::new(None),
            gateway: None,
            recipient: None,
            archive: None,
            state,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_backend(mut self, backend: Option<Arc<dyn GenerativeBackend>>) -> Self {
        self.summarizer = FallbackSummarizer::from_backend(backend.clone());
        self.composer = DigestComposer::new(backend);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn DeliveryGateway>, recipient: impl Into<String>) -> Self {
        self.gateway = Some(gateway);
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_archive(mut self, archive: DigestArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    /// Scrape, summarize, compose and (in normal mode) deliver one digest.
    ///
    /// A state database error before delivery aborts the run with nothing sent.
    /// Source, backend and delivery failures degrade the run, and once the
    /// digest is sent every state error is reported in the outcome instead.
    pub async fn run(&self, mode: RunMode) -> StateResult<RunReport> {
        let mut run = RunState::default();

        let candidates = self.scrape(&mut run).await;
        run.candidates = candidates.len();
        info!(count = run.candidates, "scraped candidates");

        let relevant = self.filter.filter(candidates);
        run.relevant = relevant.len();

        let mut seen_titles = HashSet::new();
        let unique = dedupe_titles(relevant, &mut seen_titles);
        run.unique = unique.len();

        let (mut items, dropped) = exclude_processed(unique, &self.state)?;
        run.already_processed = dropped;
        info!(
            relevant = run.relevant,
            unique = run.unique,
            already_processed = dropped,
            "filtered candidates"
        );

        let backlog = self.backlog(&items, &mut seen_titles, &mut run)?;
        items.extend(backlog);
        items.truncate(self.settings.max_items);
        run.selected = items.len();

        if items.is_empty() {
            info!("no news to send");
            return Ok(RunReport {
                state: run,
                outcome: RunOutcome::NothingToSend,
            });
        }

        if mode == RunMode::Normal {
            match self.state.record_discovered(&items) {
                Ok(recorded) => info!(recorded, "recorded discovered items"),
                Err(e) => warn!(error = %e, "failed to record discovered items"),
            }
        }

        self.fetch_bodies(&mut items, &mut run).await;

        let mut backend_throttle = Throttle::new(self.settings.backend_delay);
        self.summarize(&mut items, &mut backend_throttle, &mut run).await;

        let meta = if self.summarizer.has_primary() {
            backend_throttle.run(self.composer.compose(&items)).await
        } else {
            self.composer.compose(&items).await
        };
        let digest = Digest::new(meta, items);
        info!(subject = %digest.subject, items = digest.items.len(), "composed digest");

        self.archive(&digest);

        let outcome = match mode {
            RunMode::DryRun => RunOutcome::DryRun { digest },
            RunMode::Normal => self.deliver(digest).await,
        };

        Ok(RunReport { state: run, outcome })
    }

    /// Report state, gateway and source health plus one sample summary.
    /// Never delivers and never writes state.
    pub async fn probe(&self) -> StateResult<ProbeReport> {
        let stats = self.state.stats()?;

        let gateway_reachable = match &self.gateway {
            Some(gateway) => Some(gateway.verify_connectivity().await),
            None => None,
        };

        let mut sources = Vec::with_capacity(self.sources.len());
        let mut first_relevant: Option<NewsItem> = None;
        let mut source_throttle = Throttle::new(self.settings.source_delay);

        for source in &self.sources {
            match source_throttle.run(self.fetcher.fetch(&source.listing_url)).await {
                Ok(html) => {
                    let candidates = extract_candidates(&html, source, today());
                    let total = candidates.len();
                    let relevant = self.filter.filter(candidates);
                    sources.push(SourceProbe {
                        name: source.name.clone(),
                        candidates: total,
                        relevant: relevant.len(),
                        error: None,
                    });
                    if first_relevant.is_none() {
                        first_relevant = relevant.into_iter().next();
                    }
                }
                Err(e) => {
                    warn!(source = %source.name, error = %e, "source unavailable");
                    sources.push(SourceProbe {
                        name: source.name.clone(),
                        candidates: 0,
                        relevant: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let sample = match first_relevant {
            Some(item) => {
                let (summary, _) = self.summarizer.summarize_reporting(&item).await;
                Some((item.title, summary))
            }
            None => None,
        };

        Ok(ProbeReport {
            stats,
            gateway_reachable,
            sources,
            sample,
        })
    }

    async fn scrape(&self, run: &mut RunState) -> Vec<NewsItem> {
        let mut candidates = Vec::new();
        let mut source_throttle = Throttle::new(self.settings.source_delay);
        let fetched_on = today();

        for source in &self.sources {
            run.sources_attempted += 1;
            info!(source = %source.name, url = %source.listing_url, "scraping source");

            match source_throttle.run(self.fetcher.fetch(&source.listing_url)).await {
                Ok(html) => {
                    let found = extract_candidates(&html, source, fetched_on);
                    info!(source = %source.name, count = found.len(), "source scraped");
                    candidates.extend(found);
                }
                Err(e) => {
                    run.sources_failed += 1;
                    warn!(source = %source.name, error = %e, "source failed, skipping");
                }
            }
        }

        candidates
    }

    /// Undelivered items from earlier runs that are not already in `fresh`
    fn backlog(
        &self,
        fresh: &[NewsItem],
        seen_titles: &mut HashSet<String>,
        run: &mut RunState,
    ) -> StateResult<Vec<NewsItem>> {
        let room = self.settings.max_items.saturating_sub(fresh.len());
        if room == 0 {
            return Ok(Vec::new());
        }

        let fresh_urls: HashSet<&str> = fresh.iter().map(|i| i.url.as_str()).collect();
        let stored: Vec<NewsItem> = self
            .state
            .unprocessed(self.settings.max_items)?
            .into_iter()
            .map(|row| row.into_news_item())
            .filter(|item| !fresh_urls.contains(item.url.as_str()))
            .collect();

        let mut backlog = dedupe_titles(stored, seen_titles);
        backlog.truncate(room);
        run.backlog = backlog.len();
        if !backlog.is_empty() {
            info!(count = backlog.len(), "re-offering undelivered items");
        }
        Ok(backlog)
    }

    async fn fetch_bodies(&self, items: &mut [NewsItem], run: &mut RunState) {
        let mut throttle = Throttle::new(self.settings.article_delay);
        for item in items.iter_mut().filter(|i| i.content.is_none()) {
            item.content = throttle
                .run(fetch_article_body(self.fetcher.as_ref(), &item.url))
                .await;
            if item.content.is_some() {
                run.bodies_fetched += 1;
            }
        }
    }

    async fn summarize(&self, items: &mut [NewsItem], throttle: &mut Throttle, run: &mut RunState) {
        for item in items.iter_mut() {
            let call = self.summarizer.summarize_reporting(item);
            let (summary, fell_back) = if self.summarizer.has_primary() {
                throttle.run(call).await
            } else {
                call.await
            };
            if fell_back {
                run.fallback_summaries += 1;
            }
            info!(title = %item.title, "summarized");
            item.summary = Some(summary);
        }
    }

    fn archive(&self, digest: &Digest) {
        let Some(archive) = &self.archive else {
            return;
        };
        let html = DigestRenderer::html(digest);
        let text = DigestRenderer::text(digest);
        if let Err(e) = archive.save(digest, self.recipient.as_deref(), &html, &text) {
            warn!(error = %e, "failed to archive digest");
        }
    }

    async fn deliver(&self, mut digest: Digest) -> RunOutcome {
        let (Some(gateway), Some(recipient)) = (&self.gateway, &self.recipient) else {
            return RunOutcome::DeliveryFailed {
                error: DeliveryError::Message("no delivery gateway configured".to_string()),
                digest,
            };
        };

        let receipt = match gateway.send(&digest, recipient).await {
            Ok(receipt) => receipt,
            Err(error) => {
                warn!(error = %error, "delivery failed, items stay unprocessed");
                return RunOutcome::DeliveryFailed { error, digest };
            }
        };

        match self.state.mark_processed(&digest.items) {
            Ok(marked) => {
                let delivered_at = chrono::Utc::now();
                for item in &mut digest.items {
                    item.processed_at.get_or_insert(delivered_at);
                }
                info!(marked, receipt = %receipt.id, "digest delivered");
                RunOutcome::Sent { receipt, digest }
            }
            Err(error) => {
                warn!(error = %error, receipt = %receipt.id, "digest delivered but not marked processed");
                RunOutcome::SentUnmarked {
                    receipt,
                    digest,
                    error,
                }
            }
        }
    }
}

impl RunState {
    /// Per-stage counts, one per line
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Sources: {} scraped, {} failed",
                self.sources_attempted - self.sources_failed,
                self.sources_failed
            ),
            format!("Candidates: {}", self.candidates),
            format!("Relevant: {}", self.relevant),
            format!("Unique: {}", self.unique),
        ];
        if self.already_processed > 0 {
            lines.push(format!("Already sent before: {}", self.already_processed));
        }
        if self.backlog > 0 {
            lines.push(format!("From backlog: {}", self.backlog));
        }
        lines.push(format!("Selected: {}", self.selected));
        if self.selected > 0 {
            lines.push(format!(
                "Bodies fetched: {}/{}",
                self.bodies_fetched, self.selected
            ));
            lines.push(format!("Fallback summaries: {}", self.fallback_summaries));
        }
        lines
    }
}

/// Group digest items per source, in digest order
pub fn items_by_source(digest: &Digest) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in &digest.items {
        let count = counts.entry(item.source_name.clone()).or_insert(0);
        if *count == 0 {
            order.push(item.source_name.clone());
        }
        *count += 1;
    }
    order
        .into_iter()
        .map(|name| {
            let n = counts[&name];
            (name, n)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DigestMeta;

    #[test]
    fn test_run_state_lines() {
        let run = RunState {
            sources_attempted: 3,
            sources_failed: 1,
            candidates: 40,
            relevant: 6,
            unique: 5,
            already_processed: 2,
            backlog: 0,
            selected: 3,
            bodies_fetched: 2,
            fallback_summaries: 3,
        };
        let lines = run.lines();
        assert_eq!(lines[0], "Sources: 2 scraped, 1 failed");
        assert!(lines.contains(&"Already sent before: 2".to_string()));
        assert!(lines.contains(&"Bodies fetched: 2/3".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("From backlog")));
    }

    #[test]
    fn test_items_by_source_keeps_order() {
        let date = today();
        let digest = Digest::new(
            DigestMeta {
                subject: "s".into(),
                intro: "i".into(),
            },
            vec![
                NewsItem::new("a", "https://x/1", date, "Japan Times Sumo"),
                NewsItem::new("b", "https://x/2", date, "Japan Sumo Association"),
                NewsItem::new("c", "https://x/3", date, "Japan Times Sumo"),
            ],
        );
        assert_eq!(
            items_by_source(&digest),
            vec![
                ("Japan Times Sumo".to_string(), 2),
                ("Japan Sumo Association".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RunOutcome::NothingToSend.to_string(), "No news to send");
        assert!(!RunOutcome::NothingToSend.is_failure());
        assert!(RunOutcome::NothingToSend.digest().is_none());
    }
}
