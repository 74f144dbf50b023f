//! Error types for the agriyield pipeline.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AgriYieldError>;

#[derive(Error, Debug)]
pub enum AgriYieldError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Dataset not found, tried: {0}")]
    DatasetNotFound(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Transform or model used before fit")]
    NotFitted,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::prelude::PolarsError> for AgriYieldError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        AgriYieldError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AgriYieldError {
    fn from(err: serde_json::Error) -> Self {
        AgriYieldError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AgriYieldError {
    fn from(err: ndarray::ShapeError) -> Self {
        AgriYieldError::ShapeMismatch {
            expected: "compatible dimensions".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgriYieldError::MissingColumn("yield".to_string());
        assert_eq!(err.to_string(), "Missing required column: yield");

        let err = AgriYieldError::UnknownCategory {
            column: "crop".to_string(),
            value: "durian".to_string(),
        };
        assert!(err.to_string().contains("durian"));
        assert!(err.to_string().contains("crop"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AgriYieldError = io_err.into();
        assert!(matches!(err, AgriYieldError::IoError(_)));
    }
}
