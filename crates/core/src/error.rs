use thiserror::Error;

/// A submission that fails structural validation. Raised synchronously,
/// before any job exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("payload is missing the '{0}' field")]
    MissingField(&'static str),

    #[error("'{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("edge {index}: {reason}")]
    InvalidEdge { index: usize, reason: String },

    #[error("total edge weight is too large to compute with")]
    WeightOverflow,

    #[error("node {index}: {reason}")]
    InvalidNode { index: usize, reason: String },

    #[error("invalid value '{value}' for option '{name}': expected {expected}")]
    InvalidOption {
        name: String,
        value: String,
        expected: String,
    },
}
