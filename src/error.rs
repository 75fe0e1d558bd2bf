//! Error types for explanation profiles

use thiserror::Error;

/// Result type alias for profile operations
pub type Result<T> = std::result::Result<T, ProfileError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("No applicable variables: {0}")]
    NoApplicableVariables(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ProfileError {
    pub(crate) fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        ProfileError::ShapeError {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for ProfileError {
    fn from(err: polars::error::PolarsError) -> Self {
        ProfileError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        ProfileError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ProfileError {
    fn from(err: ndarray::ShapeError) -> Self {
        ProfileError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProfileError::FeatureNotFound("age".to_string());
        assert_eq!(err.to_string(), "Feature not found: age");
    }

    #[test]
    fn test_shape_helper() {
        let err = ProfileError::shape(10, 9);
        assert_eq!(err.to_string(), "Invalid shape: expected 10, got 9");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<f64>("not a number").unwrap_err();
        let err: ProfileError = json_err.into();
        assert!(matches!(err, ProfileError::SerializationError(_)));
    }
}
