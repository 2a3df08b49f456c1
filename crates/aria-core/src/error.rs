//! Error types for the ARIA pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Core ARIA errors
#[derive(Error, Debug, Clone)]
pub enum AriaError {
    // Initialization errors
    #[error("Model not found at {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    // Accelerator errors
    #[error("Accelerator not available: {0}")]
    GpuNotFound(String),

    #[error("Insufficient accelerator memory: required {required} bytes, available {available} bytes")]
    GpuMemory { required: u64, available: u64 },

    // Per-frame errors
    #[error("Processing failed: {0}")]
    Processing(String),

    // Input errors
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Coarse error classification used for retry and propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelNotFound,
    ModelLoad,
    GpuNotFound,
    GpuMemory,
    Processing,
    InvalidInput,
    Unexpected,
}

impl AriaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AriaError::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            AriaError::ModelLoad(_) => ErrorKind::ModelLoad,
            AriaError::GpuNotFound(_) => ErrorKind::GpuNotFound,
            AriaError::GpuMemory { .. } => ErrorKind::GpuMemory,
            AriaError::Processing(_) => ErrorKind::Processing,
            AriaError::InvalidAudio(_) | AriaError::InvalidConfig(_) => ErrorKind::InvalidInput,
            AriaError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Is this an initialization-time failure that must abort session creation?
    pub fn is_init_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ModelNotFound
                | ErrorKind::ModelLoad
                | ErrorKind::GpuNotFound
                | ErrorKind::GpuMemory
        )
    }

    pub fn model_not_found(path: impl Into<PathBuf>) -> Self {
        AriaError::ModelNotFound { path: path.into() }
    }
}

/// Result type for ARIA operations
pub type AriaResult<T> = Result<T, AriaError>;
