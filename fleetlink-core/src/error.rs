//! Storage error types for FleetLink.

use std::path::PathBuf;

use thiserror::Error;

use crate::kind::Kind;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the storage backends and the persistence façade.
///
/// [`StoreError::PrimaryUnavailable`] never reaches callers of
/// [`Persistence`](crate::Persistence): the façade answers it by falling back
/// to the durable log. Durable-log failures are the ones that propagate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The primary store could not serve the call (connection, auth,
    /// constraint or timeout failure). Nothing was committed.
    #[error("primary store unavailable: {reason}")]
    PrimaryUnavailable { reason: String },

    /// The durable log could not be read or written.
    #[error("durable log I/O error on {}: {source}", path.display())]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker owning a backend connection has shut down.
    #[error("store worker has shut down")]
    BackendShutdown,

    /// A stored row could not be decoded into its record shape.
    #[error("corrupt {kind} row at line {line}: {reason}")]
    CorruptRow {
        kind: Kind,
        line: usize,
        reason: String,
    },

    /// A timestamp string matched none of the accepted layouts.
    #[error("invalid timestamp '{input}'")]
    Timestamp { input: String },
}

impl StoreError {
    /// Create a primary-unavailable error from any displayable cause
    pub fn primary_unavailable(reason: impl ToString) -> Self {
        Self::PrimaryUnavailable {
            reason: reason.to_string(),
        }
    }

    /// Create a durable log I/O error
    pub fn log_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LogIo {
            path: path.into(),
            source,
        }
    }

    /// Create a corrupt row error
    pub fn corrupt_row(kind: Kind, line: usize, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            kind,
            line,
            reason: reason.into(),
        }
    }

    /// Whether the error comes from the primary store and is recoverable by
    /// falling back.
    pub fn is_primary_unavailable(&self) -> bool {
        matches!(self, Self::PrimaryUnavailable { .. })
    }
}
