use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use sealkeep_crypto::ContentHasher;
use sealkeep_types::{
    validate_label, Address, ConcurrencyToken, ContentAddress, Digest, EntryId, ObjectId,
    ObjectRef, RecordContent, SecretRef,
};
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::mutation::{
    ExecutionStatus, LedgerObject, Mutation, SignedTransaction, SubmissionResult,
    TransactionEffects,
};
use crate::traits::LedgerReader;
use crate::OWNER_RECORD_TYPE;

struct StoredObject {
    owner: Address,
    type_tag: String,
    version: u64,
    content: serde_json::Value,
}

impl StoredObject {
    fn digest(&self) -> Digest {
        let mut bytes = self.version.to_le_bytes().to_vec();
        bytes.extend_from_slice(self.content.to_string().as_bytes());
        Digest::of(&bytes)
    }

    fn token(&self) -> ConcurrencyToken {
        ConcurrencyToken {
            version: self.version,
            digest: self.digest(),
        }
    }

    fn to_ledger_object(&self, id: ObjectId) -> LedgerObject {
        LedgerObject {
            reference: ObjectRef::new(id, self.token()),
            owner: self.owner,
            type_tag: self.type_tag.clone(),
            content: self.content.clone(),
        }
    }
}

#[derive(Default)]
struct LedgerState {
    objects: HashMap<ObjectId, StoredObject>,
    /// Insertion order, so owned-object queries are deterministic.
    order: Vec<ObjectId>,
    executed: HashSet<Digest>,
}

/// In-process ledger with per-object versions and optimistic concurrency.
///
/// Every object carries a version (starting at 1) and a digest of its
/// content. A mutation that consumes an object must cite the current
/// `(version, digest)`; anything older is rejected with
/// [`LedgerError::StaleObject`] and leaves the object untouched.
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    record_type: String,
    read_faults: AtomicU32,
    created: AtomicU64,
}

impl InMemoryLedger {
    /// A ledger whose owner records use [`OWNER_RECORD_TYPE`].
    pub fn new() -> Self {
        Self::with_record_type(OWNER_RECORD_TYPE)
    }

    /// A ledger whose owner records carry `record_type` as their type tag.
    pub fn with_record_type(record_type: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            record_type: record_type.into(),
            read_faults: AtomicU32::new(0),
            created: AtomicU64::new(0),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Make the next `n` reads fail with [`LedgerError::Unavailable`].
    pub fn fail_next_reads(&self, n: u32) {
        self.read_faults.store(n, Ordering::SeqCst);
    }

    /// Number of objects on the ledger.
    pub fn object_count(&self) -> usize {
        self.state.read().map(|s| s.objects.len()).unwrap_or(0)
    }

    /// The current concurrency token of an object.
    pub fn current_token(&self, id: &ObjectId) -> Option<ConcurrencyToken> {
        let state = self.state.read().ok()?;
        state.objects.get(id).map(StoredObject::token)
    }

    /// Place an object directly on the ledger, bypassing transaction rules.
    ///
    /// Used to seed fixtures, including content that does not decode.
    pub fn insert_object(
        &self,
        owner: Address,
        type_tag: impl Into<String>,
        content: serde_json::Value,
    ) -> LedgerResult<ObjectRef> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let id = ObjectId::derive(format!("fixture:{n}").as_bytes());
        let object = StoredObject {
            owner,
            type_tag: type_tag.into(),
            version: 1,
            content,
        };
        let reference = ObjectRef::new(id, object.token());
        let mut state = self.lock_write()?;
        state.objects.insert(id, object);
        state.order.push(id);
        Ok(reference)
    }

    /// Verify and execute a signed transaction.
    ///
    /// Returns `Err` when the transaction is rejected before execution
    /// (bad signature, replay, stale or missing input object). Rule
    /// violations during execution yield `Ok` with a failure status.
    pub fn execute(&self, tx: SignedTransaction) -> LedgerResult<SubmissionResult> {
        let bytes = tx.data.signing_bytes()?;
        if tx.public_key.to_address() != tx.data.sender {
            return Err(LedgerError::InvalidSignature);
        }
        tx.public_key
            .verify(&bytes, &tx.signature)
            .map_err(|_| LedgerError::InvalidSignature)?;
        let digest = ContentHasher::TRANSACTION.hash(&bytes);

        let mut state = self.lock_write()?;
        if state.executed.contains(&digest) {
            return Err(LedgerError::DuplicateTransaction);
        }

        let sender = tx.data.sender;
        let outcome = match &tx.data.mutation {
            Mutation::CreateRecord => self.create_record(&mut state, sender, digest),
            Mutation::AppendEntry {
                record,
                label,
                content_address,
            } => Self::append_entry(&mut state, sender, record, label, content_address)?,
        };
        state.executed.insert(digest);

        let (status, effects) = match outcome {
            Ok(effects) => (ExecutionStatus::Success, effects),
            Err(error) => {
                warn!(tx = %digest.short_hex(), %error, "transaction aborted");
                (ExecutionStatus::Failure { error }, TransactionEffects::default())
            }
        };
        debug!(
            tx = %digest.short_hex(),
            kind = tx.data.mutation.kind(),
            sender = %sender.short(),
            success = status.is_success(),
            "transaction executed"
        );
        Ok(SubmissionResult {
            digest,
            status,
            effects,
        })
    }

    fn create_record(
        &self,
        state: &mut LedgerState,
        sender: Address,
        tx: Digest,
    ) -> Result<TransactionEffects, String> {
        let exists = state
            .objects
            .values()
            .any(|o| o.owner == sender && o.type_tag == self.record_type);
        if exists {
            return Err(format!("owner record already exists for {}", sender.short()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let mut seed = tx.as_bytes().to_vec();
        seed.extend_from_slice(&n.to_le_bytes());
        let id = ObjectId::derive(&seed);
        let object = StoredObject {
            owner: sender,
            type_tag: self.record_type.clone(),
            version: 1,
            content: RecordContent::empty(sender).to_value(),
        };
        let reference = ObjectRef::new(id, object.token());
        state.objects.insert(id, object);
        state.order.push(id);
        Ok(TransactionEffects {
            created: vec![reference],
            ..TransactionEffects::default()
        })
    }

    fn append_entry(
        state: &mut LedgerState,
        sender: Address,
        record: &ObjectRef,
        label: &str,
        content_address: &ContentAddress,
    ) -> LedgerResult<Result<TransactionEffects, String>> {
        let object = state
            .objects
            .get_mut(&record.id)
            .ok_or(LedgerError::ObjectNotFound(record.id))?;
        let current = object.token();
        if current != record.token() {
            return Err(LedgerError::StaleObject {
                id: record.id,
                requested: record.token(),
                current,
            });
        }
        if object.owner != sender {
            return Ok(Err(format!(
                "sender {} does not own object {}",
                sender.short(),
                record.id.short()
            )));
        }
        if let Err(e) = validate_label(label) {
            return Ok(Err(e.to_string()));
        }
        if !content_address.is_retrievable() {
            return Ok(Err("content address must not be the unknown sentinel".into()));
        }
        let mut content = match RecordContent::from_value(&object.content) {
            Ok(content) => content,
            Err(e) => return Ok(Err(format!("record content is malformed: {e}"))),
        };
        let entry = SecretRef {
            entry_id: EntryId(content.next_entry_id),
            label: label.to_string(),
            content_address: content_address.clone(),
        };
        content.entries.push(entry.clone());
        content.next_entry_id += 1;
        object.content = content.to_value();
        object.version += 1;
        Ok(Ok(TransactionEffects {
            created: Vec::new(),
            mutated: vec![ObjectRef::new(record.id, object.token())],
            appended: vec![entry],
        }))
    }

    fn consume_read_fault(&self) -> LedgerResult<()> {
        let faulted = self
            .read_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if faulted {
            return Err(LedgerError::Unavailable("injected read failure".into()));
        }
        Ok(())
    }

    fn lock_write(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|e| LedgerError::Internal(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn owned_objects_by_type(
        &self,
        owner: &Address,
        type_tag: &str,
    ) -> LedgerResult<Vec<LedgerObject>> {
        self.consume_read_fault()?;
        let state = self
            .state
            .read()
            .map_err(|e| LedgerError::Internal(format!("lock poisoned: {e}")))?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.objects.get(id).map(|o| (id, o)))
            .filter(|(_, o)| o.owner == *owner && o.type_tag == type_tag)
            .map(|(id, o)| o.to_ledger_object(*id))
            .collect())
    }

    async fn object(&self, id: &ObjectId) -> LedgerResult<Option<LedgerObject>> {
        self.consume_read_fault()?;
        let state = self
            .state
            .read()
            .map_err(|e| LedgerError::Internal(format!("lock poisoned: {e}")))?;
        Ok(state.objects.get(id).map(|o| o.to_ledger_object(*id)))
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("record_type", &self.record_type)
            .field("object_count", &self.object_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::TransactionData;
    use sealkeep_crypto::SigningKey;

    fn signed(key: &SigningKey, mutation: Mutation, nonce: u64) -> SignedTransaction {
        let data = TransactionData {
            sender: key.address(),
            mutation,
            nonce,
        };
        SignedTransaction::sign(data, key).unwrap()
    }

    fn append(record: ObjectRef, label: &str) -> Mutation {
        Mutation::AppendEntry {
            record,
            label: label.into(),
            content_address: ContentAddress::Known("aa11".into()),
        }
    }

    fn create(ledger: &InMemoryLedger, key: &SigningKey) -> ObjectRef {
        let result = ledger.execute(signed(key, Mutation::CreateRecord, 0)).unwrap();
        assert!(result.status.is_success());
        result.effects.created[0]
    }

    // =========================================================================
    // Creation
    // =========================================================================

    #[tokio::test]
    async fn create_record_starts_at_version_one() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let reference = create(&ledger, &key);
        assert_eq!(reference.version, 1);

        let owned = ledger
            .owned_objects_by_type(&key.address(), OWNER_RECORD_TYPE)
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        let content = RecordContent::from_value(&owned[0].content).unwrap();
        assert_eq!(content, RecordContent::empty(key.address()));
    }

    #[test]
    fn second_record_for_same_owner_fails() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        create(&ledger, &key);
        let result = ledger.execute(signed(&key, Mutation::CreateRecord, 1)).unwrap();
        assert!(!result.status.is_success());
        assert_eq!(ledger.object_count(), 1);
    }

    #[test]
    fn replayed_transaction_is_rejected() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let tx = signed(&key, Mutation::CreateRecord, 0);
        ledger.execute(tx.clone()).unwrap();
        assert_eq!(ledger.execute(tx), Err(LedgerError::DuplicateTransaction));
    }

    #[test]
    fn forged_sender_is_rejected() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let mut tx = signed(&key, Mutation::CreateRecord, 0);
        tx.data.sender = Address::from_raw([9; 32]);
        assert_eq!(ledger.execute(tx), Err(LedgerError::InvalidSignature));
    }

    // =========================================================================
    // Optimistic concurrency
    // =========================================================================

    #[test]
    fn append_with_current_token_advances_version() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let v1 = create(&ledger, &key);
        let result = ledger.execute(signed(&key, append(v1, "Mail"), 1)).unwrap();
        assert!(result.status.is_success());
        let v2 = result.effects.mutated[0];
        assert_eq!(v2.version, 2);
        assert_ne!(v2.digest, v1.digest);
        assert_eq!(ledger.current_token(&v1.id), Some(v2.token()));
    }

    #[test]
    fn append_effects_report_the_new_entry() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let v1 = create(&ledger, &key);
        let first = ledger.execute(signed(&key, append(v1, "Mail"), 1)).unwrap();
        let v2 = first.effects.mutated[0];
        let second = ledger.execute(signed(&key, append(v2, "Bank"), 2)).unwrap();

        assert_eq!(first.effects.appended.len(), 1);
        assert_eq!(first.effects.appended[0].entry_id, EntryId(1));
        assert_eq!(first.effects.appended[0].label, "Mail");
        assert_eq!(second.effects.appended[0].entry_id, EntryId(2));
        assert_eq!(
            second.effects.appended[0].content_address,
            ContentAddress::Known("aa11".into())
        );
    }

    #[test]
    fn append_with_stale_token_is_rejected() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let v1 = create(&ledger, &key);
        ledger.execute(signed(&key, append(v1, "first"), 1)).unwrap();

        let err = ledger
            .execute(signed(&key, append(v1, "second"), 2))
            .unwrap_err();
        assert!(matches!(err, LedgerError::StaleObject { .. }));
        let msg = err.to_string();
        assert!(msg.contains("not available for consumption"));
        assert!(msg.contains("current version: 2"));
        assert_eq!(ledger.current_token(&v1.id).unwrap().version, 2);
    }

    #[test]
    fn append_by_non_owner_fails_without_mutation() {
        let ledger = InMemoryLedger::new();
        let owner = SigningKey::generate();
        let intruder = SigningKey::generate();
        let v1 = create(&ledger, &owner);
        let result = ledger
            .execute(signed(&intruder, append(v1, "Mail"), 0))
            .unwrap();
        assert!(!result.status.is_success());
        assert_eq!(ledger.current_token(&v1.id), Some(v1.token()));
    }

    #[test]
    fn append_with_blank_label_fails() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let v1 = create(&ledger, &key);
        let result = ledger.execute(signed(&key, append(v1, "  "), 1)).unwrap();
        assert!(matches!(result.status, ExecutionStatus::Failure { .. }));
    }

    #[test]
    fn append_to_missing_object_is_not_found() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let ghost = ObjectRef {
            id: ObjectId::derive(b"ghost"),
            version: 1,
            digest: Digest::of(b"ghost"),
        };
        assert!(matches!(
            ledger.execute(signed(&key, append(ghost, "Mail"), 0)),
            Err(LedgerError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn entry_ids_are_sequential() {
        let ledger = InMemoryLedger::new();
        let key = SigningKey::generate();
        let mut reference = create(&ledger, &key);
        for (nonce, label) in ["a", "b", "c"].iter().enumerate() {
            let result = ledger
                .execute(signed(&key, append(reference, label), nonce as u64 + 1))
                .unwrap();
            reference = result.effects.mutated[0];
        }
        let state = ledger.state.read().unwrap();
        let content = RecordContent::from_value(&state.objects[&reference.id].content).unwrap();
        let ids: Vec<u64> = content.entries.iter().map(|e| e.entry_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(content.next_entry_id, 4);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    #[tokio::test]
    async fn injected_read_faults_are_consumed() {
        let ledger = InMemoryLedger::new();
        let owner = Address::ephemeral();
        ledger.fail_next_reads(2);
        assert!(ledger
            .owned_objects_by_type(&owner, OWNER_RECORD_TYPE)
            .await
            .is_err());
        assert!(ledger.object(&ObjectId::derive(b"x")).await.is_err());
        assert!(ledger
            .owned_objects_by_type(&owner, OWNER_RECORD_TYPE)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reads_filter_by_owner_and_type() {
        let ledger = InMemoryLedger::with_record_type("custom::Record");
        let owner = Address::ephemeral();
        ledger
            .insert_object(owner, "custom::Record", serde_json::json!({}))
            .unwrap();
        ledger
            .insert_object(owner, "other::Thing", serde_json::json!({}))
            .unwrap();
        ledger
            .insert_object(Address::ephemeral(), "custom::Record", serde_json::json!({}))
            .unwrap();
        let owned = ledger
            .owned_objects_by_type(&owner, "custom::Record")
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].type_tag, "custom::Record");

        let fetched = ledger.object(&owned[0].reference.id).await.unwrap().unwrap();
        assert_eq!(fetched.reference, owned[0].reference);
    }
}
