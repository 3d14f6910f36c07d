//! Error types for the document model

use thiserror::Error;

/// Errors raised while building, resolving or transforming documents
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown node or mark type: {0}")]
    UnknownType(String),

    #[error("Position {pos} out of range (document content size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("No node starts at position {0}")]
    NoNodeAt(usize),

    #[error("Range {from}..{to} does not lie inside a single textblock")]
    NotInTextblock { from: usize, to: usize },

    #[error("Invalid content: {0}")]
    InvalidContent(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

/// Result alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
