use thiserror::Error;

/// A single page or source could not be retrieved. Isolated to that source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid URL {0}")]
    InvalidUrl(String),
}

/// The generative backend failed or produced something unusable.
/// Callers always have a deterministic fallback for this.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend rate limited: {0}")]
    RateLimited(String),

    #[error("backend returned error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("backend returned an empty response")]
    Empty,

    #[error("backend response could not be used: {0}")]
    Unusable(String),
}

/// Transport-level delivery failure. Surfaced as the run outcome.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("delivery task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("state database I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StateResult<T> = std::result::Result<T, StateError>;
