//! Error types for the regform-core library.
//!
//! Only batch-level and infrastructure faults are errors. Problems with an
//! individual document are recorded as data in [`crate::ParseResult`].

use thiserror::Error;

/// Main error type for the regform library.
#[derive(Error, Debug)]
pub enum RegformError {
    /// Persistence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Table source error.
    #[error("table source error: {0}")]
    Source(#[from] SourceError),

    /// Batch run error.
    #[error("run error: {0}")]
    Run(#[from] RunError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by a [`crate::store::Store`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored payload could not be (de)serialized.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database location could not be prepared.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value does not map back onto the domain model.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// A run with the same key is already stored.
    #[error("iteration {iteration} already stored for {form_kind}")]
    Duplicate { form_kind: String, iteration: u32 },

    /// The store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors raised while fetching tables for a document.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The table file could not be read.
    #[error("failed to read tables for {document_id}: {source}")]
    Read {
        document_id: String,
        #[source]
        source: std::io::Error,
    },

    /// The table file is not valid JSON of the expected shape.
    #[error("malformed tables for {document_id}: {source}")]
    Malformed {
        document_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Batch-level errors. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum RunError {
    /// Selection found nothing to process.
    #[error("nothing to process for {form_kind} in {mode} mode")]
    SelectionEmpty { form_kind: String, mode: String },

    /// Cancellation arrived before any document was recorded.
    #[error("iteration {iteration} for {form_kind} cancelled before any document was processed")]
    Cancelled { form_kind: String, iteration: u32 },

    /// The requested iteration number is already used.
    #[error("iteration {iteration} already exists for {form_kind}")]
    IterationExists { form_kind: String, iteration: u32 },

    /// The requested iteration number does not follow the latest one.
    #[error("iteration {iteration} for {form_kind} must be greater than {latest}")]
    IterationNotIncreasing {
        form_kind: String,
        iteration: u32,
        latest: u32,
    },

    /// A zero batch size can never select a document.
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    /// Persistence failed mid-run.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Result type for the regform library.
pub type Result<T> = std::result::Result<T, RegformError>;
