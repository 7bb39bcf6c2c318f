use thiserror::Error;

/// Failure returned at an engine boundary.
///
/// Every variant is recoverable by the caller: resubmit more data, train
/// first, or fix the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Insufficient training data: {0}")]
    InsufficientData(String),

    #[error("{0} not trained yet")]
    NotTrained(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Why a single raw record was rejected during batch preparation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a finite number")]
    NotNumeric { field: &'static str },

    #[error("field `{field}` has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
