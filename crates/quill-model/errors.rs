//! Error types for the document model
//!
//! `ModelError` covers every failure the document engine can report: bad
//! positions, unknown schema entries, transactions applied to the wrong
//! snapshot and content that does not fit the schema.

use core::fmt;
use thiserror::Error;

/// Main error type for quill-model operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Position past the end of the document
    #[error("Position out of bounds: {position} (document size: {size})")]
    PositionOutOfBounds { position: usize, size: usize },

    /// Range with `from > to` or an end past the document
    #[error("Invalid range: from {from}, to {to} (document size: {size})")]
    InvalidRange { from: usize, to: usize, size: usize },

    /// Mark type not present in the schema
    #[error("Unknown mark type: {name}")]
    UnknownMark { name: String },

    /// Node type not present in the schema
    #[error("Unknown node type: {name}")]
    UnknownNode { name: String },

    /// Two schema entries of the same kind share a name
    #[error("Duplicate {kind} in schema: {name}")]
    DuplicateSchemaEntry { kind: &'static str, name: String },

    /// Transaction built from a document other than the state's current one
    #[error("Transaction was created from a different document than the current state")]
    MismatchedTransaction,

    /// Content rejected by the schema and not repaired by a handler
    #[error("Invalid content: {message}")]
    InvalidContent { message: String },

    /// Serialization failure for the JSON wire format
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ModelError {
    /// Create a new invalid content error
    pub fn invalid_content<T: fmt::Display>(message: T) -> Self {
        Self::InvalidContent {
            message: message.to_string(),
        }
    }

    /// Create a new serialization error
    pub fn serialization<T: fmt::Display>(message: T) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Check if this is a position-related error
    #[must_use]
    pub const fn is_position_error(&self) -> bool {
        matches!(
            self,
            Self::PositionOutOfBounds { .. } | Self::InvalidRange { .. }
        )
    }

    /// Check if this error came from content that does not fit the schema
    #[must_use]
    pub const fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidContent { .. } | Self::UnknownMark { .. } | Self::UnknownNode { .. }
        )
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

/// Result type alias for model operations
pub type Result<T> = core::result::Result<T, ModelError>;
