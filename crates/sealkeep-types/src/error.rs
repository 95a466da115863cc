use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid content address: {0}")]
    InvalidContentAddress(String),

    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}
