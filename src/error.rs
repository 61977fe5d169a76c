//! Error types for vqbench
//!
//! Fatal conditions (catalog, checkpoint, whole-cell failures) stop the sweep.
//! `ReplicationFailed` is the only recoverable variant: the measurer drops the
//! replication and keeps going.

use std::time::Duration;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// vqbench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Query catalog could not be parsed into the expected shape
    #[error("Malformed query catalog: {0}\nNo sweep can run until the catalog is fixed.")]
    MalformedCatalog(String),

    /// Query index outside the catalog (sweep bounds violated)
    #[error("Query index {index} out of range (catalog holds {total} queries)")]
    IndexOutOfRange {
        /// Requested query index
        index: usize,
        /// Number of queries in the catalog
        total: usize,
    },

    /// A single replication failed; it is dropped from the cell's samples
    #[error("Replication failed: {0}")]
    ReplicationFailed(String),

    /// Every replication of a cell failed; the sweep stops at this cell
    #[error("All {attempts} replications failed for query {query} ({context})\nThe checkpoint still points at the previous cell; rerun to retry this one.")]
    AllReplicationsFailed {
        /// Query index of the failed cell
        query: usize,
        /// Version parameters of the failed cell
        context: String,
        /// Number of replications attempted
        attempts: usize,
    },

    /// Checkpoint file exists but cannot be decoded
    #[error("Corrupt checkpoint: {0}\nRepair or delete the checkpoint; the sweep will not restart from zero on its own.")]
    CorruptCheckpoint(String),

    /// External query engine error
    #[error("Query engine error: {0}")]
    Engine(String),

    /// External versioned store error
    #[error("Versioned store error: {0}")]
    Store(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A replication exceeded its time budget
    #[error("Replication timed out after {0:?}")]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
