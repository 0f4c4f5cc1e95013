//! Error handling

use thiserror::Error;

use crate::logic::features::layout::LayoutMismatchError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    // Precondition violations
    #[error("model not fitted, call fit() first")]
    NotFitted,

    #[error("cannot fit on an empty batch")]
    EmptyBatch,

    #[error("feature dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Configuration errors
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown model '{0}', expected 'isolation_forest' or 'autoencoder'")]
    UnknownModel(String),

    // Persistence errors
    #[error(transparent)]
    LayoutMismatch(#[from] LayoutMismatchError),

    #[error("model file checksum mismatch")]
    ChecksumMismatch,

    #[error("model file holds a '{found}' model, expected '{expected}'")]
    ModelKindMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Store errors
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}
