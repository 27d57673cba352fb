// Public modules
pub mod archive;
pub mod backend;
pub mod composer;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod relevance;
pub mod render;
pub mod state;
pub mod summarizer;
pub mod throttle;

// Re-export commonly used types
pub use archive::{ArchivedDigest, DigestArchive};
pub use backend::{ClaudeBackend, GenerativeBackend};
pub use composer::DigestComposer;
pub use config::{Config, EmailConfig};
pub use delivery::{DeliveryGateway, DeliveryReceipt, SmtpGateway};
pub use error::{BackendError, DeliveryError, FetchError, StateError};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use models::{Digest, DigestMeta, NewsItem, ParserKind, SourceConfig};
pub use pipeline::{
    items_by_source, DigestPipeline, PipelineSettings, ProbeReport, RunMode, RunOutcome,
    RunReport, RunState,
};
pub use relevance::RelevanceFilter;
pub use render::DigestRenderer;
pub use state::{StateStats, StateTracker, StoredArticle};
pub use summarizer::{DeterministicSummarizer, FallbackSummarizer, GenerativeSummarizer, Summarizer};
