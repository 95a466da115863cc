/// Errors from sealing and unsealing secrets.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SealError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("unsupported envelope format: {0}")]
    UnsupportedFormat(u8),
}

/// Result alias for sealing operations.
pub type SealResult<T> = Result<T, SealError>;
