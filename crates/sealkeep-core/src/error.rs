use serde::{Deserialize, Serialize};
use thiserror::Error;

use sealkeep_ledger::WalletError;
use sealkeep_types::{Address, ContentAddress};

/// Errors surfaced by the save/retrieve core.
///
/// Collaborator errors are mapped onto these at the call site; callers only
/// ever see the most specific kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Ledger reads kept failing after the resolver's retry budget.
    #[error("ledger unavailable after {attempts} attempts: {message}")]
    LedgerUnavailable { attempts: u32, message: String },

    #[error("no owner record for {0}")]
    NoOwnerRecord(Address),

    /// The cited record version was stale on every attempt.
    #[error("version conflict after {attempts} attempts: {message}")]
    VersionConflict { attempts: u32, message: String },

    #[error("cancelled by user: {0}")]
    UserCancelled(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("storage failed: {0}")]
    StorageFailed(String),

    #[error("content not found: {0}")]
    NotFound(ContentAddress),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("wallet is not connected or has no account")]
    WalletNotConnected,

    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("malformed owner record: {0}")]
    MalformedRecord(String),

    #[error("owner record creation failed: {0}")]
    RecordCreationFailed(String),
}

/// Coarse grouping of [`VaultError`]s for callers deciding between "retry"
/// and "fix and retry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The user declined; do not re-prompt automatically.
    Cancelled,
    /// Lost a race with another writer; retrying later may succeed.
    Conflict,
    /// The ledger was unreachable; retrying later may succeed.
    Transient,
    Failure,
}

impl VaultError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UserCancelled(_) => ErrorClass::Cancelled,
            Self::VersionConflict { .. } => ErrorClass::Conflict,
            Self::LedgerUnavailable { .. } => ErrorClass::Transient,
            _ => ErrorClass::Failure,
        }
    }

    /// Whether a caller-initiated retry of the whole operation is sensible.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Conflict | ErrorClass::Transient)
    }
}

impl From<WalletError> for VaultError {
    /// Classify a wallet-reported failure.
    ///
    /// Stale-object rejections are recognised by the ledger's message, the
    /// only signal that crosses the wallet boundary.
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::UserRejected(msg) => Self::UserCancelled(msg),
            WalletError::NotConnected | WalletError::NoAccount => Self::WalletNotConnected,
            WalletError::Submission(msg) if is_stale_version(&msg) => Self::VersionConflict {
                attempts: 1,
                message: msg,
            },
            WalletError::Submission(msg) => Self::TransactionFailed(msg),
        }
    }
}

/// Does a submission error message describe a stale object version?
pub(crate) fn is_stale_version(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("not available for consumption") || message.contains("current version")
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Errors loading or validating a [`crate::VaultConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
