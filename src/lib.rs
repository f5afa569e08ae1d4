//! Swapi-Harvest: a rate-limited, link-resolving batch harvester
//!
//! This crate fetches a dense id range of resources from a JSON HTTP API in
//! fixed-size batches, resolves the secondary resources each one links to
//! (fetching every distinct link once per batch), and persists the finished
//! records without stalling the next batch's fetches.

pub mod config;
pub mod harvest;
pub mod record;
pub mod storage;

use thiserror::Error;

/// Main error type for Swapi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Link resolution error: {0}")]
    Link(#[from] LinkError),

    #[error("Record error: {0}")]
    Record(#[from] record::RecordError),

    #[error("Sink error: {0}")]
    Sink(#[from] storage::SinkError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Harvest incomplete: {failures} failure(s), {dropped} dropped resource(s)")]
    Incomplete { failures: usize, dropped: usize },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a single HTTP request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Failed to decode JSON body from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Rate limiter closed")]
    LimiterClosed,
}

/// Errors raised while resolving link fields of a batch
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Linked resource {url} could not be fetched: {source}")]
    Fetch { url: String, source: FetchError },

    #[error("Linked resource {url} returned HTTP {status_code}")]
    Status { url: String, status_code: u16 },

    #[error("Linked resource {url} has no attribute '{attribute}'")]
    MissingAttribute { url: String, attribute: String },

    #[error("Link field '{field}' of resource {id} is neither a URL nor a list of URLs")]
    Malformed { id: u32, field: String },

    #[error("Fetch task for {url} did not complete: {message}")]
    Task { url: String, message: String },
}

/// Result type alias for Swapi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for single fetches
pub type FetchOutcome<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{Fetcher, HarvestReport, Harvester, LinkFieldSpec, RateLimiter};
pub use record::{Character, FromRecord, Record};
pub use storage::{RecordSink, SqliteStorage};
