use sealkeep_types::{ConcurrencyToken, ObjectId};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The mutation cited an object version that is no longer current.
    #[error(
        "object {id} at version {} is not available for consumption, current version: {}",
        .requested.version,
        .current.version
    )]
    StaleObject {
        id: ObjectId,
        requested: ConcurrencyToken,
        current: ConcurrencyToken,
    },

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("transaction already executed")]
    DuplicateTransaction,

    /// Transient read-side failure (network, node overload).
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors reported by a signing wallet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The user declined the signing prompt.
    #[error("user rejected the request: {0}")]
    UserRejected(String),

    #[error("wallet is not connected")]
    NotConnected,

    #[error("wallet has no account")]
    NoAccount,

    /// The ledger rejected the submission; carries its message verbatim.
    #[error("{0}")]
    Submission(String),
}
