//! Error types for feedstore.

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Common error type for feedstore operations.
#[derive(Error, Debug)]
pub enum FeedstoreError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input or parsed items.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Rejected feed URL.
    #[error("invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Upstream feed fetch or parse failure.
    #[error("feed fetch failed: {0}")]
    ExternalService(String),

    /// Document store failure.
    #[error("datastore error: {0}")]
    Store(#[from] StoreError),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Job queue admission refused because the queue is near capacity.
    ///
    /// Retryable: the client may resubmit after backing off.
    #[error("async queue under backpressure (load: {load:.2}%)")]
    Backpressure {
        /// Queue load at rejection time, as a percentage.
        load: f64,
    },

    /// Job submission did not complete within the configured deadline.
    #[error("async queue submission timed out after {0:?}")]
    SubmitTimeout(Duration),

    /// The worker pool has been shut down and accepts no more jobs.
    #[error("worker pool is shut down")]
    PoolClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for feedstore operations.
pub type Result<T> = std::result::Result<T, FeedstoreError>;
