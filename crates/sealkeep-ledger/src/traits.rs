use async_trait::async_trait;
use sealkeep_types::{Address, ObjectId};

use crate::error::{LedgerResult, WalletError};
use crate::mutation::{LedgerObject, Mutation, SubmissionResult};

/// Read boundary of the ledger.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// All objects of `type_tag` currently owned by `owner`.
    async fn owned_objects_by_type(
        &self,
        owner: &Address,
        type_tag: &str,
    ) -> LedgerResult<Vec<LedgerObject>>;

    /// A single object by id, or `None` if it does not exist.
    async fn object(&self, id: &ObjectId) -> LedgerResult<Option<LedgerObject>>;
}

/// A signing wallet: holds identities and submits mutations on their behalf.
///
/// `sign_and_submit` may prompt the user; a declined prompt surfaces as
/// [`WalletError::UserRejected`].
#[async_trait]
pub trait Wallet: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Identities this wallet can sign for.
    fn accounts(&self) -> Vec<Address>;

    /// The identity used for signing.
    fn active_account(&self) -> Option<Address> {
        self.accounts().first().copied()
    }

    async fn sign_and_submit(&self, mutation: Mutation) -> Result<SubmissionResult, WalletError>;
}
