use std::sync::Arc;

use tracing::{debug, info, warn};

use sealkeep_crypto::{Plaintext, Sealer};
use sealkeep_ledger::{Mutation, SubmissionResult};
use sealkeep_store::BlobStore;
use sealkeep_types::{validate_label, Address, ContentAddress, ObjectRef, SecretRef};

use crate::error::{VaultError, VaultResult};
use crate::events::{EventBus, Operation, Outcome, Phase};
use crate::executor::TransactionExecutor;
use crate::retry::RetryPolicy;

/// Runs a save: encrypt, store, ensure an owner record, append.
///
/// Each phase starts only after the previous one succeeded. Nothing is
/// rolled back: if the record cannot be created or the append fails, the
/// stored envelope stays in the blob store unreferenced.
///
/// Not idempotent. Saving the same secret twice yields two entries with
/// distinct content addresses.
#[derive(Clone)]
pub struct SaveCoordinator {
    executor: TransactionExecutor,
    blobs: Arc<dyn BlobStore>,
    sealer: Arc<dyn Sealer>,
    creation_poll: RetryPolicy,
    approve_on_seal: bool,
    events: EventBus,
}

impl SaveCoordinator {
    pub fn new(
        executor: TransactionExecutor,
        blobs: Arc<dyn BlobStore>,
        sealer: Arc<dyn Sealer>,
        creation_poll: RetryPolicy,
        approve_on_seal: bool,
        events: EventBus,
    ) -> Self {
        Self {
            executor,
            blobs,
            sealer,
            creation_poll,
            approve_on_seal,
            events,
        }
    }

    /// Save `plaintext` under `label`.
    ///
    /// `handle` is the caller's last known owner record, if any. It only
    /// decides whether creation may be needed; the token it carries is
    /// never submitted.
    pub async fn save(
        &self,
        handle: Option<ObjectRef>,
        label: &str,
        plaintext: &Plaintext,
        context: Option<&str>,
    ) -> VaultResult<SecretRef> {
        let result = self.run(handle, label, plaintext, context).await;
        self.events.finished(Operation::Save, Phase::Complete, &result);
        result
    }

    async fn run(
        &self,
        handle: Option<ObjectRef>,
        label: &str,
        plaintext: &Plaintext,
        context: Option<&str>,
    ) -> VaultResult<SecretRef> {
        validate_label(label).map_err(|e| VaultError::InvalidLabel(e.to_string()))?;
        let owner = self.executor.signer()?;

        let envelope = self
            .phase(Phase::Encrypt, async {
                self.sealer
                    .seal(plaintext, context, self.approve_on_seal)
                    .await
                    .map_err(|e| VaultError::EncryptionFailed(e.to_string()))
            })
            .await?;
        debug!(seal_id = %envelope.metadata.seal_id, bytes = envelope.envelope.len(), "secret sealed");

        let content_address = self
            .phase(Phase::Store, async {
                self.blobs
                    .put(envelope.envelope)
                    .await
                    .map_err(|e| VaultError::StorageFailed(e.to_string()))
            })
            .await?;
        debug!(address = %content_address, "envelope stored");

        self.phase(Phase::EnsureRecord, self.ensure_record(&owner, handle, &content_address))
            .await?;

        let appended = self
            .phase(Phase::Append, self.append(label, &content_address))
            .await
            .inspect_err(|err| {
                warn!(address = %content_address, error = %err, "append failed, envelope left unreferenced");
            })?;

        // The append is final here; no further ledger reads may fail the save.
        let secret = Self::appended_entry(&appended, label, &content_address)?;
        info!(entry = %secret.entry_id, label = %secret.label, "secret saved");
        Ok(secret)
    }

    async fn phase<T, F>(&self, phase: Phase, fut: F) -> VaultResult<T>
    where
        F: std::future::Future<Output = VaultResult<T>>,
    {
        self.events.started(Operation::Save, phase);
        let result = fut.await;
        self.events.finished(Operation::Save, phase, &result);
        result
    }

    /// Make sure `owner` has a record, creating one if needed.
    async fn ensure_record(
        &self,
        owner: &Address,
        handle: Option<ObjectRef>,
        orphan: &ContentAddress,
    ) -> VaultResult<ObjectRef> {
        let resolver = self.executor.resolver();
        if let Some(handle) = handle {
            return Ok(handle);
        }
        if let Some(existing) = resolver.resolve(owner).await? {
            debug!(record = %existing, "owner record already present");
            return Ok(existing);
        }

        match self.executor.create_record().await {
            Ok(result) => {
                debug!(tx = %result.digest.short_hex(), "owner record creation submitted")
            }
            // Lost a creation race: another call created the record first.
            Err(VaultError::TransactionFailed(msg)) => {
                if let Some(existing) = resolver.resolve(owner).await? {
                    debug!(record = %existing, "owner record created concurrently");
                    return Ok(existing);
                }
                warn!(address = %orphan, "record creation failed, envelope left unreferenced");
                return Err(VaultError::TransactionFailed(msg));
            }
            Err(err) => {
                warn!(address = %orphan, error = %err, "record creation failed, envelope left unreferenced");
                return Err(err);
            }
        }

        self.creation_poll
            .run(
                |_| async move {
                    match resolver.resolve(owner).await {
                        Ok(Some(record)) => Ok(record),
                        Ok(None) => Err(VaultError::RecordCreationFailed(format!(
                            "no owner record visible for {}",
                            owner.short()
                        ))),
                        Err(err) => Err(err),
                    }
                },
                |err| matches!(err, VaultError::RecordCreationFailed(_)),
                |attempt, delay, _| {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "owner record not visible yet");
                    self.events.emit(
                        Operation::Save,
                        Phase::EnsureRecord,
                        Outcome::Retrying {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        },
                    );
                },
            )
            .await
            .map_err(|err| match err {
                VaultError::RecordCreationFailed(msg) => VaultError::RecordCreationFailed(format!(
                    "{msg} after {} polls",
                    self.creation_poll.max_attempts
                )),
                other => other,
            })
    }

    async fn append(
        &self,
        label: &str,
        content_address: &ContentAddress,
    ) -> VaultResult<SubmissionResult> {
        self.executor
            .execute(|record| Mutation::AppendEntry {
                record,
                label: label.to_string(),
                content_address: content_address.clone(),
            })
            .await
    }

    /// The entry the append created, as reported in its effects.
    fn appended_entry(
        appended: &SubmissionResult,
        label: &str,
        content_address: &ContentAddress,
    ) -> VaultResult<SecretRef> {
        appended
            .effects
            .appended
            .iter()
            .find(|e| e.label == label && e.content_address == *content_address)
            .cloned()
            .ok_or_else(|| {
                VaultError::MalformedRecord(format!(
                    "transaction {} succeeded without reporting its entry",
                    appended.digest.short_hex()
                ))
            })
    }
}
