use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sealkeep_crypto::SigningKey;
use sealkeep_types::Address;
use tracing::{debug, info};

use crate::error::WalletError;
use crate::memory::InMemoryLedger;
use crate::mutation::{Mutation, SignedTransaction, SubmissionResult, TransactionData};
use crate::traits::Wallet;

/// A single-identity wallet that signs locally and submits to an
/// [`InMemoryLedger`].
///
/// `reject_next` simulates the user declining signing prompts.
pub struct LocalWallet {
    key: SigningKey,
    ledger: Arc<InMemoryLedger>,
    connected: AtomicBool,
    nonce: AtomicU64,
    rejections: AtomicU32,
}

impl LocalWallet {
    /// A connected wallet for `key`.
    pub fn new(key: SigningKey, ledger: Arc<InMemoryLedger>) -> Self {
        Self {
            key,
            ledger,
            connected: AtomicBool::new(true),
            nonce: AtomicU64::new(0),
            rejections: AtomicU32::new(0),
        }
    }

    /// A connected wallet with a freshly generated key.
    pub fn generate(ledger: Arc<InMemoryLedger>) -> Self {
        Self::new(SigningKey::generate(), ledger)
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!(account = %self.address().short(), "wallet connected");
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!(account = %self.address().short(), "wallet disconnected");
    }

    /// Decline the next `n` signing prompts.
    pub fn reject_next(&self, n: u32) {
        self.rejections.store(n, Ordering::SeqCst);
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn accounts(&self) -> Vec<Address> {
        if self.is_connected() {
            vec![self.address()]
        } else {
            Vec::new()
        }
    }

    async fn sign_and_submit(&self, mutation: Mutation) -> Result<SubmissionResult, WalletError> {
        if !self.is_connected() {
            return Err(WalletError::NotConnected);
        }
        let declined = self
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if declined {
            return Err(WalletError::UserRejected(format!(
                "{} was not approved",
                mutation.kind()
            )));
        }

        let data = TransactionData {
            sender: self.address(),
            nonce: self.nonce.fetch_add(1, Ordering::SeqCst),
            mutation,
        };
        let kind = data.mutation.kind();
        let tx = SignedTransaction::sign(data, &self.key)
            .map_err(|e| WalletError::Submission(e.to_string()))?;
        let result = self
            .ledger
            .execute(tx)
            .map_err(|e| WalletError::Submission(e.to_string()))?;
        debug!(kind, tx = %result.digest.short_hex(), "submitted");
        Ok(result)
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address().short())
            .field("connected", &self.is_connected())
            .finish()
    }
}
