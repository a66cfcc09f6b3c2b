use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid change status: {0}")]
    InvalidStatus(String),

    #[error("invalid project name: {0:?}")]
    InvalidProjectName(String),

    #[error("invalid submit requirement status: {0}")]
    InvalidSubmitRequirementStatus(String),
}
