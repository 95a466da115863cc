//! Scripted collaborators for exercising the core against the in-memory
//! ledger, store and sealer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sealkeep_crypto::{
    AesGcmSealer, Plaintext, SealError, SealResult, SealedSecret, Sealer, SigningKey,
    UnsealedSecret,
};
use sealkeep_ledger::{
    InMemoryLedger, LedgerObject, LedgerReader, LedgerResult, LocalWallet, Mutation,
    SignedTransaction, SubmissionResult, TransactionData, Wallet, WalletError,
};
use sealkeep_store::{BlobStore, InMemoryBlobStore, StoreError, StoreResult};
use sealkeep_types::{Address, ContentAddress, ObjectId, ObjectRef};

use crate::approval::ApprovalChecker;
use crate::config::VaultConfig;
use crate::events::EventBus;
use crate::executor::TransactionExecutor;
use crate::resolver::VersionResolver;
use crate::retrieve::RetrieveCoordinator;
use crate::save::SaveCoordinator;
use crate::vault::{Collaborators, Vault};
use crate::view::OwnerRecordView;

const OWNER_KEY: [u8; 32] = [7; 32];

/// Sign and execute an append as the record's owner, citing its current
/// token. Panics if the ledger refuses.
fn append_as_owner(
    ledger: &InMemoryLedger,
    key: &SigningKey,
    record: ObjectId,
    label: &str,
    content_address: &ContentAddress,
    nonce: u64,
) -> ObjectRef {
    let token = ledger.current_token(&record).expect("record exists");
    let data = TransactionData {
        sender: key.address(),
        mutation: Mutation::AppendEntry {
            record: ObjectRef::new(record, token),
            label: label.to_string(),
            content_address: content_address.clone(),
        },
        nonce,
    };
    let tx = SignedTransaction::sign(data, key).expect("sign");
    let result = ledger.execute(tx).expect("execute");
    assert!(result.status.is_success(), "{:?}", result.status);
    result.effects.mutated[0]
}

// =============================================================================
// Ledger reader
// =============================================================================

/// Counts reads and can hide owned objects.
pub(crate) struct CountingReader {
    inner: Arc<InMemoryLedger>,
    owned: AtomicU32,
    objects: AtomicU32,
    hide_owned: AtomicBool,
}

impl CountingReader {
    pub fn owned_calls(&self) -> u32 {
        self.owned.load(Ordering::SeqCst)
    }

    pub fn object_calls(&self) -> u32 {
        self.objects.load(Ordering::SeqCst)
    }

    /// Report no owned objects, as a lagging read replica would.
    pub fn hide_owned(&self, hide: bool) {
        self.hide_owned.store(hide, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerReader for CountingReader {
    async fn owned_objects_by_type(
        &self,
        owner: &Address,
        type_tag: &str,
    ) -> LedgerResult<Vec<LedgerObject>> {
        self.owned.fetch_add(1, Ordering::SeqCst);
        let objects = self.inner.owned_objects_by_type(owner, type_tag).await?;
        if self.hide_owned.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(objects)
    }

    async fn object(&self, id: &ObjectId) -> LedgerResult<Option<LedgerObject>> {
        self.objects.fetch_add(1, Ordering::SeqCst);
        self.inner.object(id).await
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Advance the cited record with another writer, then submit the
    /// now-stale mutation.
    Interfere,
    /// Fail without reaching the ledger.
    Fail(WalletError),
    /// Submit normally, then make the next `n` ledger reads fail.
    ReadOutageAfter(u32),
}

/// A [`LocalWallet`] that plays a script of steps before each submission.
pub(crate) struct ScriptedWallet {
    inner: LocalWallet,
    other_writer: SigningKey,
    steps: Mutex<VecDeque<Step>>,
    submissions: AtomicU32,
    nonce: AtomicU64,
}

impl ScriptedWallet {
    pub fn script(&self, steps: Vec<Step>) {
        *self.steps.lock().unwrap() = steps.into();
    }

    pub fn submissions(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &LocalWallet {
        &self.inner
    }
}

#[async_trait]
impl Wallet for ScriptedWallet {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn accounts(&self) -> Vec<Address> {
        self.inner.accounts()
    }

    async fn sign_and_submit(&self, mutation: Mutation) -> Result<SubmissionResult, WalletError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Fail(err)) => return Err(err),
            Some(Step::ReadOutageAfter(n)) => {
                let result = self.inner.sign_and_submit(mutation).await;
                self.inner.ledger().fail_next_reads(n);
                return result;
            }
            Some(Step::Interfere) => {
                if let Some(record) = mutation.input_object() {
                    append_as_owner(
                        self.inner.ledger(),
                        &self.other_writer,
                        record.id,
                        "written elsewhere",
                        &ContentAddress::Known("e1sewhere".into()),
                        self.nonce.fetch_add(1, Ordering::SeqCst),
                    );
                }
            }
            None => {}
        }
        self.inner.sign_and_submit(mutation).await
    }
}

// =============================================================================
// Blob store
// =============================================================================

pub(crate) struct SpyStore {
    inner: InMemoryBlobStore,
    puts: AtomicU32,
    gets: AtomicU32,
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
}

impl SpyStore {
    pub fn inner(&self) -> &InMemoryBlobStore {
        &self.inner
    }

    pub fn puts(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for SpyStore {
    async fn put(&self, bytes: Vec<u8>) -> StoreResult<ContentAddress> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected put failure".into()));
        }
        self.inner.put(bytes).await
    }

    async fn get(&self, address: &ContentAddress) -> StoreResult<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected get failure".into()));
        }
        self.inner.get(address).await
    }
}

// =============================================================================
// Sealer
// =============================================================================

pub(crate) struct SpySealer {
    inner: AesGcmSealer,
    seals: AtomicU32,
    unseals: AtomicU32,
    fail_seals: AtomicBool,
}

impl SpySealer {
    pub fn seals(&self) -> u32 {
        self.seals.load(Ordering::SeqCst)
    }

    pub fn unseals(&self) -> u32 {
        self.unseals.load(Ordering::SeqCst)
    }

    pub fn fail_seals(&self, fail: bool) {
        self.fail_seals.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Sealer for SpySealer {
    async fn seal(
        &self,
        plaintext: &Plaintext,
        context: Option<&str>,
        approved: bool,
    ) -> SealResult<SealedSecret> {
        self.seals.fetch_add(1, Ordering::SeqCst);
        if self.fail_seals.load(Ordering::SeqCst) {
            return Err(SealError::Encryption("injected seal failure".into()));
        }
        self.inner.seal(plaintext, context, approved).await
    }

    async fn unseal(&self, envelope: &[u8]) -> SealResult<UnsealedSecret> {
        self.unseals.fetch_add(1, Ordering::SeqCst);
        self.inner.unseal(envelope).await
    }
}

// =============================================================================
// Harness
// =============================================================================

/// One owner, one ledger, spies on every collaborator.
pub(crate) struct Harness {
    pub config: VaultConfig,
    pub events: EventBus,
    pub ledger: Arc<InMemoryLedger>,
    pub reader: Arc<CountingReader>,
    pub wallet: Arc<ScriptedWallet>,
    pub store: Arc<SpyStore>,
    pub sealer: Arc<SpySealer>,
    owner_key: SigningKey,
    record: Mutex<Option<ObjectId>>,
    nonce: AtomicU64,
}

impl Harness {
    pub fn new() -> Self {
        let config = VaultConfig::default();
        let ledger = Arc::new(InMemoryLedger::with_record_type(config.record_type.clone()));
        let reader = Arc::new(CountingReader {
            inner: ledger.clone(),
            owned: AtomicU32::new(0),
            objects: AtomicU32::new(0),
            hide_owned: AtomicBool::new(false),
        });
        let wallet = Arc::new(ScriptedWallet {
            inner: LocalWallet::new(SigningKey::from_bytes(OWNER_KEY), ledger.clone()),
            other_writer: SigningKey::from_bytes(OWNER_KEY),
            steps: Mutex::new(VecDeque::new()),
            submissions: AtomicU32::new(0),
            nonce: AtomicU64::new(2_000_000),
        });
        let store = Arc::new(SpyStore {
            inner: InMemoryBlobStore::new(),
            puts: AtomicU32::new(0),
            gets: AtomicU32::new(0),
            fail_puts: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
        });
        let sealer = Arc::new(SpySealer {
            inner: AesGcmSealer::new([42; 32]),
            seals: AtomicU32::new(0),
            unseals: AtomicU32::new(0),
            fail_seals: AtomicBool::new(false),
        });
        Self {
            events: EventBus::new(config.event_capacity),
            config,
            ledger,
            reader,
            wallet,
            store,
            sealer,
            owner_key: SigningKey::from_bytes(OWNER_KEY),
            record: Mutex::new(None),
            nonce: AtomicU64::new(1_000_000),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner_key.address()
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Create the owner's record directly on the ledger.
    pub fn create_record(&self) -> ObjectRef {
        let data = TransactionData {
            sender: self.owner(),
            mutation: Mutation::CreateRecord,
            nonce: self.next_nonce(),
        };
        let tx = SignedTransaction::sign(data, &self.owner_key).unwrap();
        let result = self.ledger.execute(tx).unwrap();
        assert!(result.status.is_success());
        let reference = result.effects.created[0];
        *self.record.lock().unwrap() = Some(reference.id);
        reference
    }

    /// Append an entry as the owner, outside the core.
    pub fn owner_append(&self, label: &str, content_address: &ContentAddress) -> ObjectRef {
        let record = *self.record.lock().unwrap();
        let record = record.expect("create_record first");
        append_as_owner(
            &self.ledger,
            &self.owner_key,
            record,
            label,
            content_address,
            self.next_nonce(),
        )
    }

    /// Another device of the same owner appends an entry.
    pub fn external_append(&self, label: &str) -> ObjectRef {
        self.owner_append(label, &ContentAddress::Known("f00d".into()))
    }

    /// Seal and store an envelope without going through the spies.
    pub async fn seal_and_store(
        &self,
        plaintext: &str,
        context: Option<&str>,
        approved: bool,
    ) -> ContentAddress {
        let sealed = self
            .sealer
            .inner
            .seal(&Plaintext::new(plaintext), context, approved)
            .await
            .unwrap();
        self.store.inner.put(sealed.envelope).await.unwrap()
    }

    pub fn resolver(&self) -> VersionResolver {
        VersionResolver::new(
            self.reader.clone(),
            self.config.record_type.clone(),
            self.config.resolver_policy(),
            self.events.clone(),
        )
    }

    pub fn executor(&self) -> TransactionExecutor {
        TransactionExecutor::new(
            self.resolver(),
            self.wallet.clone(),
            self.config.executor_policy(),
            self.events.clone(),
        )
    }

    pub fn checker(&self) -> ApprovalChecker {
        ApprovalChecker::new(self.reader.clone(), self.events.clone())
    }

    pub fn retriever(&self) -> RetrieveCoordinator {
        RetrieveCoordinator::new(self.store.clone(), self.sealer.clone(), self.events.clone())
    }

    pub fn saver(&self) -> SaveCoordinator {
        SaveCoordinator::new(
            self.executor(),
            self.store.clone(),
            self.sealer.clone(),
            self.config.creation_poll_policy(),
            self.config.approve_on_seal,
            self.events.clone(),
        )
    }

    pub fn view(&self) -> OwnerRecordView {
        OwnerRecordView::new(self.resolver(), self.retriever(), self.events.clone())
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            ledger: self.reader.clone(),
            wallet: self.wallet.clone(),
            blobs: self.store.clone(),
            sealer: self.sealer.clone(),
        }
    }

    pub fn vault(&self) -> Vault {
        Vault::new(self.config.clone(), self.collaborators()).expect("valid config")
    }
}
