use std::sync::Arc;

use sealkeep_crypto::{Plaintext, SealMetadata, Sealer};
use sealkeep_ledger::{LedgerReader, Wallet};
use sealkeep_store::BlobStore;
use sealkeep_types::{ObjectId, ObjectRef, OwnerRecord, SecretRef};
use tracing::info;

use crate::approval::ApprovalChecker;
use crate::config::VaultConfig;
use crate::error::{ConfigError, VaultResult};
use crate::events::{EventBus, EventFilter, EventStream};
use crate::executor::TransactionExecutor;
use crate::resolver::VersionResolver;
use crate::retrieve::{RetrieveCoordinator, RetrievedSecret};
use crate::save::SaveCoordinator;
use crate::view::{ListedEntry, OwnerRecordView};

/// The four collaborators a [`Vault`] drives.
pub struct Collaborators {
    pub ledger: Arc<dyn LedgerReader>,
    pub wallet: Arc<dyn Wallet>,
    pub blobs: Arc<dyn BlobStore>,
    pub sealer: Arc<dyn Sealer>,
}

/// All core components wired to one config and one event bus, acting for
/// the wallet's active account.
pub struct Vault {
    config: VaultConfig,
    events: EventBus,
    executor: TransactionExecutor,
    save: SaveCoordinator,
    retrieve: RetrieveCoordinator,
    view: OwnerRecordView,
    approval: ApprovalChecker,
}

impl Vault {
    pub fn new(config: VaultConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let Collaborators {
            ledger,
            wallet,
            blobs,
            sealer,
        } = collaborators;
        let events = EventBus::new(config.event_capacity);

        let resolver = VersionResolver::new(
            ledger.clone(),
            config.record_type.clone(),
            config.resolver_policy(),
            events.clone(),
        );
        let executor = TransactionExecutor::new(
            resolver.clone(),
            wallet,
            config.executor_policy(),
            events.clone(),
        );
        let retrieve = RetrieveCoordinator::new(blobs.clone(), sealer.clone(), events.clone());
        let save = SaveCoordinator::new(
            executor.clone(),
            blobs,
            sealer,
            config.creation_poll_policy(),
            config.approve_on_seal,
            events.clone(),
        );
        let view = OwnerRecordView::new(resolver, retrieve.clone(), events.clone());
        let approval = ApprovalChecker::new(ledger, events.clone());

        info!(record_type = %config.record_type, "vault ready");
        Ok(Self {
            config,
            events,
            executor,
            save,
            retrieve,
            view,
            approval,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    /// The active account's owner record, if it has one.
    pub async fn record(&self) -> VaultResult<Option<OwnerRecord>> {
        let owner = self.executor.signer()?;
        self.executor.resolver().load(&owner).await
    }

    /// Save a secret for the active account, creating its owner record on
    /// first use.
    pub async fn save(
        &self,
        label: &str,
        plaintext: &Plaintext,
        context: Option<&str>,
    ) -> VaultResult<SecretRef> {
        self.save.save(None, label, plaintext, context).await
    }

    /// Save with a caller-held record handle, skipping the existence lookup.
    pub async fn save_with_handle(
        &self,
        handle: ObjectRef,
        label: &str,
        plaintext: &Plaintext,
        context: Option<&str>,
    ) -> VaultResult<SecretRef> {
        self.save.save(Some(handle), label, plaintext, context).await
    }

    pub async fn retrieve(&self, secret: &SecretRef) -> VaultResult<RetrievedSecret> {
        self.retrieve.retrieve(secret).await
    }

    pub async fn inspect(&self, secret: &SecretRef) -> VaultResult<(SealMetadata, Option<String>)> {
        self.retrieve.inspect(secret).await
    }

    pub async fn list(&self) -> VaultResult<Vec<ListedEntry>> {
        let owner = self.executor.signer()?;
        self.view.list(&owner).await
    }

    /// Whether the active account can approve operations on `record_id`.
    /// `false` whenever that cannot be established.
    pub async fn is_approved(&self, record_id: &ObjectId) -> bool {
        match self.executor.signer() {
            Ok(owner) => self.approval.check(record_id, &owner).await,
            Err(_) => false,
        }
    }
}
