//! Error types for the loan risk pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for every pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {name} = {value}, {reason}")]
    InvalidConfiguration {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("Data type error in column '{column}': {reason}")]
    DataType { column: String, reason: String },

    #[error("Unmapped category '{value}' in column '{column}'")]
    UnmappedCategory { column: String, value: String },

    #[error("Column names '{first}' and '{second}' both normalize to '{normalized}'")]
    NameCollision {
        first: String,
        second: String,
        normalized: String,
    },

    #[error("Unsupported estimator {0}")]
    UnsupportedEstimator(String),

    #[error("Length mismatch: {expected} true labels, {actual} predicted labels")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Label index {index} out of range for {available} label names")]
    IndexOutOfRange { index: i64, available: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl PipelineError {
    /// Shorthand for an `InvalidConfiguration` error
    pub fn invalid_config(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidConfiguration {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a `DataType` error
    pub fn data_type(column: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::DataType {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataLoad(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Configuration(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::Training(format!("invalid shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::UnmappedCategory {
            column: "loan_grade".to_string(),
            value: "H".to_string(),
        };
        assert_eq!(err.to_string(), "Unmapped category 'H' in column 'loan_grade'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_invalid_config_helper() {
        let err = PipelineError::invalid_config("cv", 1, "must be at least 2");
        assert_eq!(err.to_string(), "Invalid configuration: cv = 1, must be at least 2");
    }
}
