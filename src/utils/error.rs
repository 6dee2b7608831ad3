//! Error Handling Module
//!
//! Defines the error type shared by the log directory, checkpoint and chart
//! helpers. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for trainkit operations
#[derive(Error, Debug)]
pub enum TrainKitError {
    /// IO error (directory creation, checkpoint writes, image output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization of the checkpoint container
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Burn failed to encode or decode a model/optimizer record
    #[error("Record error: {0}")]
    Record(String),

    /// A stored parameter does not fit the target module
    #[error("Shape mismatch at parameter {parameter}: model expects {expected:?}, checkpoint holds {found:?}")]
    ShapeMismatch {
        parameter: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chart could not be rendered
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for TrainKitError {
    fn from(err: serde_json::Error) -> Self {
        TrainKitError::Serialization(err.to_string())
    }
}

impl From<burn::record::RecorderError> for TrainKitError {
    fn from(err: burn::record::RecorderError) -> Self {
        TrainKitError::Record(err.to_string())
    }
}

impl From<image::ImageError> for TrainKitError {
    fn from(err: image::ImageError) -> Self {
        TrainKitError::Render(err.to_string())
    }
}

/// Convenience Result type for trainkit operations
pub type Result<T> = std::result::Result<T, TrainKitError>;
