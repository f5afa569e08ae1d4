//! Sink trait and error types
//!
//! This module defines the interface through which finished batches of
//! records are persisted.

use thiserror::Error;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned: {0}")]
    Poisoned(String),

    #[error("Store task for batch {batch} did not complete: {message}")]
    Task { batch: usize, message: String },
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Durable destination for finished records
///
/// `store` is called from the blocking pool and may run for several batches
/// at once, so implementations must synchronize internally.
pub trait RecordSink<T>: Send + Sync {
    /// Persists one batch of records
    fn store(&self, records: &[T]) -> SinkResult<()>;
}
