//! Ledger and wallet collaborators for Sealkeep.
//!
//! This crate defines the two trait boundaries the core talks to:
//! - [`LedgerReader`]: owned-object queries and single-object fetches
//! - [`Wallet`]: connection state, identities, and `sign_and_submit`
//!
//! It also ships in-process implementations that honour those contracts
//! exactly, including optimistic concurrency control:
//! - [`InMemoryLedger`]: versioned objects; a mutation citing a stale
//!   `(version, digest)` is rejected with [`LedgerError::StaleObject`]
//! - [`LocalWallet`]: an Ed25519 identity that signs and submits to an
//!   [`InMemoryLedger`]

pub mod error;
pub mod memory;
pub mod mutation;
pub mod traits;
pub mod wallet;

pub use error::{LedgerError, LedgerResult, WalletError};
pub use memory::InMemoryLedger;
pub use mutation::{
    ExecutionStatus, LedgerObject, Mutation, SignedTransaction, SubmissionResult,
    TransactionData, TransactionEffects,
};
pub use traits::{LedgerReader, Wallet};
pub use wallet::LocalWallet;

/// Default ledger type tag of an owner record.
pub const OWNER_RECORD_TYPE: &str = "sealkeep::vault::OwnerRecord";
