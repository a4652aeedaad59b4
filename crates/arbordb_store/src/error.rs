//! Error types for storage operations.

use arbordb_codec::CodecError;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or an I/O operation failed.
    ///
    /// Connectivity loss is always surfaced, never silently dropped;
    /// retry policy belongs to the caller.
    #[error("storage unavailable: {source}")]
    Unavailable {
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Another process holds the store's exclusive lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The durable journal is corrupted or has an incompatible format.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The requested filter/order combination has no backing support.
    ///
    /// Mirrors the native engine's compiled-query limitation: an
    /// unsupported combination is a deterministic error, never a wrong
    /// result.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of why the query cannot be executed.
        message: String,
    },

    /// A key, entity, or cursor failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Creates an unavailable error from an I/O failure.
    pub fn unavailable(source: io::Error) -> Self {
        Self::Unavailable { source }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }
}
