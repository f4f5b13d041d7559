//! Error types for embedding extraction.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::{DecodeError, EncodeError};

/// Errors produced while loading models, extracting features, or persisting
/// gallery artifacts.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Model loading failed (missing file, bad checkpoint, shape mismatch).
    #[error("failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Image decoding or preprocessing failed.
    #[error("invalid image {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    /// A tensor operation failed.
    #[error("tensor operation failed: {message}")]
    Tensor { message: String },

    /// Configuration parsing or validation failed.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Input validation failed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Gallery artifact encoding failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Gallery artifact decoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbedError {
    /// Wrap a candle error with operation context.
    pub(crate) fn tensor(context: impl Into<String>, e: candle_core::Error) -> Self {
        Self::Tensor {
            message: format!("{}: {}", context.into(), e),
        }
    }
}

/// Result type for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;
