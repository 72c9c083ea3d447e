use std::path::PathBuf;

use thiserror::Error;

/// Result type for creview operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Errors raised at the component boundaries of the review pipeline.
///
/// Only the review orchestrator turns these into "zero contribution";
/// every other layer propagates them.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Source file does not exist.
    #[error("code file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Source file exists but is not a `.c` or `.h` file.
    #[error("unsupported source file '{}': only .c or .h files are allowed", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Guideline storage could not be read or written.
    #[error("guideline store: {0}")]
    GuidelineStore(String),

    /// The structural C parse failed. Recovered locally by the chunker.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Two vectors that must be compared have different lengths.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The external model call failed (network, auth, empty response).
    #[error("model call failed: {0}")]
    ModelCall(String),

    /// Chunking produced zero units; there is nothing to send for review.
    #[error("nothing to review: no chunks produced from {0}")]
    NothingToReview(String),
}

impl ReviewError {
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn model_call(msg: impl Into<String>) -> Self {
        Self::ModelCall(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::GuidelineStore(msg.into())
    }

    /// Returns true for errors caused by bad user input (missing file,
    /// wrong extension). These are fatal to a run.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::UnsupportedExtension(_) | Self::GuidelineStore(_)
        )
    }
}
