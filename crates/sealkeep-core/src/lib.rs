//! Save/retrieve orchestration for Sealkeep.
//!
//! Turns a plaintext secret into a ledger-referenced, retrievable artifact
//! and back, against a ledger that enforces optimistic concurrency:
//!
//! - [`VersionResolver`]: fresh `(id, version, digest)` of the caller's
//!   owner record, with bounded retry on transient read failure
//! - [`TransactionExecutor`]: resolve, build, submit; retries only on
//!   version conflicts, never on user cancellation
//! - [`ApprovalChecker`]: fail-closed ownership check
//! - [`SaveCoordinator`]: encrypt, store, ensure record, append
//! - [`RetrieveCoordinator`]: fetch, decrypt
//! - [`OwnerRecordView`]: per-entry listing with isolated failures
//!
//! [`Vault`] bundles all of them behind one config and one [`EventBus`].

pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod resolver;
pub mod retrieve;
pub mod retry;
pub mod save;
pub mod vault;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use approval::ApprovalChecker;
pub use config::{RetryConfig, VaultConfig};
pub use error::{ConfigError, ErrorClass, VaultError, VaultResult};
pub use events::{drain, EventBus, EventFilter, EventStream, Operation, Outcome, Phase, VaultEvent};
pub use executor::TransactionExecutor;
pub use resolver::VersionResolver;
pub use retrieve::{RetrieveCoordinator, RetrievedSecret};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use save::SaveCoordinator;
pub use vault::{Collaborators, Vault};
pub use view::{ListedEntry, OwnerRecordView};

// Re-export the types callers need to drive the core.
pub use sealkeep_crypto::{Plaintext, SealMetadata};
pub use sealkeep_types::{Address, ContentAddress, EntryId, ObjectId, ObjectRef, OwnerRecord, SecretRef};
