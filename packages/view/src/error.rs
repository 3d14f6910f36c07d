//! Error types for the view layer

use thiserror::Error;
use verso_model::ModelError;

/// Programmer-facing failures of view operations.
///
/// Recoverable conditions (patch failure, node view refusal) never show up
/// here; they degrade to rebuilding the affected subtree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("DOM location is outside the rendered document")]
    PositionNotFound,

    #[error("Element {0} does not exist")]
    UnknownDomNode(usize),

    #[error("Transaction was built against a different document")]
    StaleTransaction,

    #[error("A composition is already active")]
    CompositionActive,

    #[error("No composition is active")]
    NoComposition,

    #[error("View has been destroyed")]
    Destroyed,
}

/// Result alias for view operations
pub type ViewResult<T> = Result<T, ViewError>;
