//! Error types for burrow-relay.

use burrow_types::{TransferId, TransferStatus};
use std::path::PathBuf;

/// Main error type for burrow-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Unknown identifier in one of the registries.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Which registry was searched ("peer", "transfer request", ...).
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Missing or malformed input. Nothing was mutated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Attempt to mutate a transfer that already reached a terminal state.
    #[error("transfer {transfer_id} is already {status}")]
    InvalidTransition {
        /// The transfer that was left untouched.
        transfer_id: TransferId,
        /// Its terminal status.
        status: TransferStatus,
    },

    /// Payload staging error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Shorthand for [`RelayError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        RelayError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for errors caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::NotFound { .. }
                | RelayError::InvalidInput(_)
                | RelayError::InvalidTransition { .. }
        )
    }
}

/// Payload staging errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem error while staging or purging.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
