//! Error types for storage and the metrics service.

use thiserror::Error;

use crate::types::{ClientId, MetricKind, WebsiteId};

/// Backing-store failure (cache, refresh log or website registry).
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite error, including busy timeouts.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored payload could not be decoded.
    #[error("Corrupt cached payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A cache row holds a payload of another metric kind.
    #[error("Cached payload kind {found} stored under {expected}")]
    KindMismatch { expected: MetricKind, found: MetricKind },

    /// A stored timestamp is out of range.
    #[error("Corrupt timestamp in column {0}")]
    Timestamp(&'static str),

    /// Database file could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the metrics service.
///
/// Quota exhaustion is not an error; see `RefreshOutcome::QuotaExceeded`.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The website does not exist or is inactive.
    #[error("Website {0} not found")]
    WebsiteNotFound(WebsiteId),

    /// The website belongs to another client.
    #[error("Website {website_id} does not belong to client {client_id}")]
    NotAuthorized {
        website_id: WebsiteId,
        client_id: ClientId,
    },

    /// Backing store unavailable where no degradation is possible.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
