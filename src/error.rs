//! Error handling for wavclass
//!
//! Every failure in the pipeline surfaces as a [`ClassifyError`]. A prediction
//! that falls below the confidence threshold is not an error and never shows
//! up here.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for wavclass operations
pub type Result<T> = std::result::Result<T, ClassifyError>;

/// Main error type for wavclass operations
#[derive(Error, Debug)]
pub enum ClassifyError {
    // File Errors
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Cannot decode audio file {}: {reason}", path.display())]
    Decode {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Training Errors
    #[error("Insufficient training data: {reason}")]
    InsufficientData { reason: String },

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClassifyError {
    /// Build a decode error for `path` from any underlying error.
    pub fn decode<E>(path: impl Into<PathBuf>, reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ClassifyError::Decode {
            path: path.into(),
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ClassifyError::NotADirectory { .. } => "NOT_A_DIRECTORY",
            ClassifyError::Decode { .. } => "DECODE_ERROR",
            ClassifyError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ClassifyError::EmptyAudio => "EMPTY_AUDIO",
            ClassifyError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            ClassifyError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            ClassifyError::InvalidConfig { .. } => "INVALID_CONFIG",
            ClassifyError::Io(_) => "IO_ERROR",
            ClassifyError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error only concerns a single input file.
    ///
    /// The interactive loop reports these and keeps prompting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClassifyError::FileNotFound { .. }
                | ClassifyError::Decode { .. }
                | ClassifyError::UnsupportedFormat { .. }
                | ClassifyError::EmptyAudio
                | ClassifyError::DimensionMismatch { .. }
        )
    }

    /// Path of the offending file, when the error is tied to one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ClassifyError::FileNotFound { path }
            | ClassifyError::NotADirectory { path }
            | ClassifyError::Decode { path, .. } => Some(path),
            _ => None,
        }
    }
}
