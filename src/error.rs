//! Error types for the stayprice pipeline

use thiserror::Error;

/// Result type alias for stayprice operations
pub type Result<T> = std::result::Result<T, StaypriceError>;

/// Main error type for the stayprice pipeline
#[derive(Error, Debug)]
pub enum StaypriceError {
    /// Malformed input, missing required column, unparseable value
    #[error("Data error: {0}")]
    DataError(String),

    /// A feature vector's shape or order disagrees with the trained schema
    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    /// Persisted model/state unreadable or version-incompatible
    #[error("Artifact error: {0}")]
    ArtifactError(String),

    /// Empty hyperparameter grid or invalid fold count
    #[error("Search configuration error: {0}")]
    SearchConfigError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for StaypriceError {
    fn from(err: polars::error::PolarsError) -> Self {
        StaypriceError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for StaypriceError {
    fn from(err: serde_json::Error) -> Self {
        StaypriceError::ArtifactError(err.to_string())
    }
}
