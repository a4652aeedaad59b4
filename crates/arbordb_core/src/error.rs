//! Error types for ArborDB core.

use arbordb_codec::CodecError;
use arbordb_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
///
/// Malformed caller input (an unrecognized operator token, a bad cursor,
/// an unparsable options document) fails before any storage call; storage
/// and codec failures propagate unchanged. A missing entity on a direct
/// lookup is never an error - those operations return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Wire encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// An unrecognized comparison operator token.
    #[error("invalid filter operator: {token:?}")]
    InvalidOperator {
        /// The token that failed to parse.
        token: String,
    },

    /// A query options document that doesn't match the expected format.
    #[error("invalid query options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },

    /// An object could not be converted to or from an entity.
    #[error("model conversion failed: {message}")]
    Conversion {
        /// Description of the conversion failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid operator error.
    pub fn invalid_operator(token: impl Into<String>) -> Self {
        Self::InvalidOperator {
            token: token.into(),
        }
    }

    /// Creates an invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}
