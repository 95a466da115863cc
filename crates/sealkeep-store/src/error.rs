use sealkeep_types::ContentAddress;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is stored under this address.
    #[error("blob not found: {0}")]
    NotFound(ContentAddress),

    /// The address is the `unknown` sentinel or otherwise unusable.
    #[error("invalid content address: {0}")]
    InvalidAddress(ContentAddress),

    /// Empty payloads are not stored.
    #[error("refusing to store an empty blob")]
    EmptyBlob,

    /// Storage backend is read-only or otherwise refusing writes.
    #[error("store is read-only")]
    ReadOnly,

    /// Failure inside the storage backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
