//! Error types for the polyclass benchmarking harness

use thiserror::Error;

/// Result type alias for polyclass operations
pub type Result<T> = std::result::Result<T, PolyError>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum PolyError {
    /// Fold count, roster or parameter settings that cannot work with the data
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Feature/label length mismatch or malformed arrays
    #[error("Invalid shape: expected {expected}, got {actual}")]
    DataShapeError { expected: String, actual: String },

    /// A classifier or grid search failed during fit/predict
    #[error("Fit error in {classifier}: {reason}")]
    FitError { classifier: String, reason: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Data error: {0}")]
    Data(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PolyError {
    pub fn config(msg: impl Into<String>) -> Self {
        PolyError::ConfigurationError(msg.into())
    }

    pub fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        PolyError::DataShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn fit(classifier: impl Into<String>, reason: impl Into<String>) -> Self {
        PolyError::FitError {
            classifier: classifier.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PolyError {
    fn from(err: polars::error::PolarsError) -> Self {
        PolyError::Data(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PolyError {
    fn from(err: ndarray::ShapeError) -> Self {
        PolyError::DataShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<ndarray_npy::ReadNpyError> for PolyError {
    fn from(err: ndarray_npy::ReadNpyError) -> Self {
        PolyError::Data(err.to_string())
    }
}
