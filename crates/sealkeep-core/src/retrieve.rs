use std::sync::Arc;

use tracing::{debug, warn};

use sealkeep_crypto::{Plaintext, SealError, SealMetadata, Sealer, UnsealedSecret};
use sealkeep_store::{BlobStore, StoreError};
use sealkeep_types::SecretRef;

use crate::error::{VaultError, VaultResult};
use crate::events::{EventBus, Operation, Phase};

/// A decrypted secret.
#[derive(Debug)]
pub struct RetrievedSecret {
    pub plaintext: Plaintext,
    pub context: Option<String>,
    /// Frozen into the envelope when it was sealed.
    pub approved: bool,
    pub metadata: SealMetadata,
}

/// Fetches and decrypts secrets. Touches neither the ledger nor the wallet.
#[derive(Clone)]
pub struct RetrieveCoordinator {
    blobs: Arc<dyn BlobStore>,
    sealer: Arc<dyn Sealer>,
    events: EventBus,
}

impl RetrieveCoordinator {
    pub fn new(blobs: Arc<dyn BlobStore>, sealer: Arc<dyn Sealer>, events: EventBus) -> Self {
        Self {
            blobs,
            sealer,
            events,
        }
    }

    pub async fn retrieve(&self, secret: &SecretRef) -> VaultResult<RetrievedSecret> {
        let result = self.open(secret, Operation::Retrieve).await.map(|unsealed| {
            RetrievedSecret {
                approved: unsealed.metadata.approved,
                plaintext: unsealed.plaintext,
                context: unsealed.context,
                metadata: unsealed.metadata,
            }
        });
        self.events.finished(Operation::Retrieve, Phase::Complete, &result);
        result
    }

    /// Decrypt an entry and keep only its metadata and context. The
    /// plaintext is dropped (and zeroed) before this returns.
    pub async fn inspect(&self, secret: &SecretRef) -> VaultResult<(SealMetadata, Option<String>)> {
        let unsealed = self.open(secret, Operation::List).await?;
        Ok((unsealed.metadata, unsealed.context))
    }

    async fn open(&self, secret: &SecretRef, operation: Operation) -> VaultResult<UnsealedSecret> {
        if !secret.content_address.is_retrievable() {
            return Err(VaultError::InvalidReference(format!(
                "entry {} ({}) has no retrievable content address",
                secret.entry_id, secret.label
            )));
        }

        self.events.started(operation, Phase::Fetch);
        let envelope = self
            .blobs
            .get(&secret.content_address)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(address) => VaultError::NotFound(address),
                StoreError::InvalidAddress(address) => {
                    VaultError::InvalidReference(format!("unusable content address {address}"))
                }
                other => VaultError::StorageFailed(other.to_string()),
            });
        self.events.finished(operation, Phase::Fetch, &envelope);
        let envelope = envelope?;

        self.events.started(operation, Phase::Decrypt);
        let unsealed = self
            .sealer
            .unseal(&envelope)
            .await
            .map_err(|e: SealError| VaultError::DecryptionFailed(e.to_string()));
        self.events.finished(operation, Phase::Decrypt, &unsealed);
        match &unsealed {
            Ok(u) => debug!(entry = %secret.entry_id, seal_id = %u.metadata.seal_id, "envelope opened"),
            Err(err) => warn!(entry = %secret.entry_id, error = %err, "envelope could not be opened"),
        }
        unsealed
    }
}
