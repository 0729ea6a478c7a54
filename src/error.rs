//! Error types for the sync engine.
//!
//! Variants follow the engine's error taxonomy: connectivity failures are
//! always retryable and never surfaced as data loss, validation failures
//! skip a single record, and only `NoContent` / `SyncInProgress` reach the
//! caller as hard failures.

use thiserror::Error;

/// Result type alias using the engine's [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in sync engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No network, DNS failure, or timeout. Always retryable; pending
    /// records are untouched when this is returned.
    #[error("network unavailable: {0}")]
    Connectivity(String),

    /// The server answered with a non-success status.
    #[error("server returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The server answered, but the payload could not be interpreted.
    #[error("malformed server response: {0}")]
    Protocol(String),

    /// A local record is malformed and was skipped.
    #[error("invalid record {id}: {reason}")]
    Validation { id: String, reason: String },

    /// Local content is empty and the initial download failed. Fatal to
    /// app startup.
    #[error("no local content and initial download failed: {0}")]
    NoContent(String),

    /// A sync is already running for this user. Rejected synchronously,
    /// never queued.
    #[error("sync already in progress for user {0}")]
    SyncInProgress(String),

    /// Sync is not configured
    #[error("sync not configured: server_url and api_key are required")]
    NotConfigured,

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// True for failures caused by the network being unreachable, as
    /// opposed to the server rejecting or garbling a request.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SyncError::Connectivity(_))
    }

    /// True for any failure of the remote exchange itself - unreachable
    /// network, error status, or an unreadable payload. These are the
    /// failures background refreshes absorb; local store errors are not
    /// among them and always propagate.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Connectivity(_) | SyncError::Api { .. } | SyncError::Protocol(_)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            SyncError::Connectivity(err.to_string())
        } else {
            SyncError::Protocol(err.to_string())
        }
    }
}
